//! Dataset access traits
//!
//! Conversion code never touches a file format directly. Inputs are read through
//! [`DatasetReader`] and the output is built through [`DatasetWriter`]. Every value is
//! presented as an `ArrayD<FloatValue>` regardless of the on-disk precision.
//!
//! [`MemoryDataset`] implements both traits and is used to test the pipeline without
//! any file IO. The NetCDF backend lives in the `inmap-prep` crate behind its `netcdf`
//! feature.

use crate::errors::{InmapError, InmapResult};
use crate::FloatValue;
use ndarray::{ArrayD, ArrayViewD, IxDyn};
use serde::{Deserialize, Serialize};

/// Value of a global or per-variable attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Text(String),
    Int(i64),
    Ints(Vec<i64>),
    Float(f64),
    Floats(Vec<f64>),
}

impl AttributeValue {
    /// Scalar numeric value, if the attribute holds exactly one number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Float(v) => Some(*v),
            AttributeValue::Int(v) => Some(*v as f64),
            AttributeValue::Floats(v) if v.len() == 1 => Some(v[0]),
            AttributeValue::Ints(v) if v.len() == 1 => Some(v[0] as f64),
            _ => None,
        }
    }

    /// Scalar integer value
    ///
    /// Floats are accepted if they hold a whole number.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(v) => Some(*v),
            AttributeValue::Ints(v) if v.len() == 1 => Some(v[0]),
            _ => self
                .as_f64()
                .filter(|v| v.fract() == 0.0)
                .map(|v| v as i64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

/// Descriptive attributes carried by an output variable
///
/// Meteorological fields copy their WRF attributes. Chemistry fields only carry a
/// description and units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableAttributes {
    pub description: String,
    pub units: String,
    pub stagger: Option<String>,
    pub coordinates: Option<String>,
    pub field_type: Option<i64>,
    pub memory_order: Option<String>,
}

impl VariableAttributes {
    pub fn new(description: &str, units: &str) -> Self {
        Self {
            description: description.to_string(),
            units: units.to_string(),
            ..Default::default()
        }
    }

    /// Attributes of a WRF variable
    ///
    /// Missing attributes are left empty rather than treated as errors.
    pub fn from_wrf(dataset: &impl DatasetReader, variable: &str) -> Self {
        let text = |name: &str| {
            dataset
                .variable_attribute(variable, name)
                .and_then(|v| v.as_str().map(|s| s.to_string()))
        };
        Self {
            description: text("description").unwrap_or_default(),
            units: text("units").unwrap_or_default(),
            stagger: text("stagger"),
            coordinates: text("coordinates"),
            field_type: dataset
                .variable_attribute(variable, "FieldType")
                .and_then(|v| v.as_i64()),
            memory_order: text("MemoryOrder"),
        }
    }

    /// Attributes of an IOAPI (CMAQ/MCIP) variable
    ///
    /// IOAPI pads its text attributes with spaces, which are trimmed here.
    pub fn from_ioapi(dataset: &impl DatasetReader, variable: &str) -> Self {
        let text = |name: &str| {
            dataset
                .variable_attribute(variable, name)
                .and_then(|v| v.as_str().map(|s| s.trim().to_string()))
                .unwrap_or_default()
        };
        Self::new(&text("var_desc"), &text("units"))
    }

    /// Attribute name/value pairs in the order they are written
    pub fn to_pairs(&self) -> Vec<(String, AttributeValue)> {
        let mut pairs = vec![
            ("description".to_string(), self.description.as_str().into()),
            ("units".to_string(), self.units.as_str().into()),
        ];
        if let Some(stagger) = &self.stagger {
            pairs.push(("stagger".to_string(), stagger.as_str().into()));
        }
        if let Some(coordinates) = &self.coordinates {
            pairs.push(("coordinates".to_string(), coordinates.as_str().into()));
        }
        if let Some(field_type) = self.field_type {
            pairs.push(("FieldType".to_string(), field_type.into()));
        }
        if let Some(memory_order) = &self.memory_order {
            pairs.push(("MemoryOrder".to_string(), memory_order.as_str().into()));
        }
        pairs
    }
}

/// Read access to a gridded dataset
pub trait DatasetReader {
    /// Length of a named dimension
    fn dimension_len(&self, name: &str) -> Option<usize>;

    /// Dimension names of a variable, or `None` if the variable does not exist
    fn variable_dimensions(&self, name: &str) -> Option<Vec<String>>;

    fn has_variable(&self, name: &str) -> bool {
        self.variable_dimensions(name).is_some()
    }

    /// Value of a single attribute of a variable
    fn variable_attribute(&self, variable: &str, attribute: &str) -> Option<AttributeValue>;

    /// All global attributes in file order
    fn global_attributes(&self) -> Vec<(String, AttributeValue)>;

    fn global_attribute(&self, name: &str) -> Option<AttributeValue> {
        self.global_attributes()
            .into_iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Read the full contents of a numeric variable
    fn read(&self, name: &str) -> InmapResult<ArrayD<FloatValue>>;

    /// Read a character variable as one string per leading index
    ///
    /// Used for the WRF `Times` variable.
    fn read_text(&self, name: &str) -> InmapResult<Vec<String>>;
}

/// Write access to the output dataset
pub trait DatasetWriter {
    fn create_dimension(&mut self, name: &str, len: usize) -> InmapResult<()>;

    /// Declare a new zero-initialised variable over existing dimensions
    fn create_variable(
        &mut self,
        name: &str,
        dimensions: &[&str],
        attributes: &VariableAttributes,
    ) -> InmapResult<()>;

    fn set_global_attribute(&mut self, name: &str, value: AttributeValue) -> InmapResult<()>;

    /// Shape of a declared variable
    fn variable_shape(&self, name: &str) -> InmapResult<Vec<usize>>;

    /// Replace the values of a declared variable
    ///
    /// The shape of `values` must equal the declared shape.
    fn write(&mut self, name: &str, values: ArrayViewD<FloatValue>) -> InmapResult<()>;

    /// Flush pending writes so the output is durable
    fn sync(&mut self) -> InmapResult<()>;
}

#[derive(Debug, Clone)]
struct MemoryVariable {
    name: String,
    dimensions: Vec<String>,
    attributes: Vec<(String, AttributeValue)>,
    values: ArrayD<FloatValue>,
}

/// In-memory dataset implementing both [`DatasetReader`] and [`DatasetWriter`]
///
/// Variables keep their creation order. The number of [`DatasetWriter::sync`] calls is
/// recorded so tests can check that the output is flushed after each field.
#[derive(Debug, Clone, Default)]
pub struct MemoryDataset {
    dimensions: Vec<(String, usize)>,
    variables: Vec<MemoryVariable>,
    text_variables: Vec<(String, Vec<String>)>,
    global_attributes: Vec<(String, AttributeValue)>,
    sync_count: usize,
}

impl MemoryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or resize a dimension without any checks
    pub fn create_dimension_unchecked(&mut self, name: &str, len: usize) {
        match self.dimensions.iter_mut().find(|(n, _)| n == name) {
            Some(existing) => existing.1 = len,
            None => self.dimensions.push((name.to_string(), len)),
        }
    }

    /// Insert a numeric variable with its values
    ///
    /// Dimensions that do not exist yet are created from the shape of `values`.
    /// Existing dimensions must match.
    pub fn insert_variable(
        &mut self,
        name: &str,
        dimensions: &[&str],
        values: ArrayD<FloatValue>,
    ) -> InmapResult<()> {
        if dimensions.len() != values.ndim() {
            return Err(InmapError::ShapeMismatch {
                variable: name.to_string(),
                expected: vec![dimensions.len()],
                found: values.shape().to_vec(),
            });
        }
        for (dim, len) in dimensions.iter().zip(values.shape()) {
            match self.dimension_len(dim) {
                Some(existing) if existing != *len => {
                    return Err(InmapError::ShapeMismatch {
                        variable: name.to_string(),
                        expected: vec![existing],
                        found: vec![*len],
                    })
                }
                Some(_) => {}
                None => self.create_dimension_unchecked(dim, *len),
            }
        }
        self.variables.retain(|v| v.name != name);
        self.variables.push(MemoryVariable {
            name: name.to_string(),
            dimensions: dimensions.iter().map(|d| d.to_string()).collect(),
            attributes: Vec::new(),
            values,
        });
        Ok(())
    }

    /// Insert a character variable such as `Times`
    pub fn insert_text(&mut self, name: &str, values: Vec<String>) {
        self.text_variables.retain(|(n, _)| n != name);
        self.text_variables.push((name.to_string(), values));
    }

    pub fn insert_variable_attribute(
        &mut self,
        variable: &str,
        attribute: &str,
        value: AttributeValue,
    ) -> InmapResult<()> {
        let var = self.variable_mut(variable)?;
        var.attributes.retain(|(n, _)| n != attribute);
        var.attributes.push((attribute.to_string(), value));
        Ok(())
    }

    pub fn insert_global_attribute(&mut self, name: &str, value: AttributeValue) {
        self.global_attributes.retain(|(n, _)| n != name);
        self.global_attributes.push((name.to_string(), value));
    }

    /// Names of all numeric variables in creation order
    pub fn variable_names(&self) -> Vec<String> {
        self.variables.iter().map(|v| v.name.clone()).collect()
    }

    pub fn sync_count(&self) -> usize {
        self.sync_count
    }

    fn variable(&self, name: &str) -> InmapResult<&MemoryVariable> {
        self.variables
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| InmapError::MissingVariable(name.to_string()))
    }

    fn variable_mut(&mut self, name: &str) -> InmapResult<&mut MemoryVariable> {
        self.variables
            .iter_mut()
            .find(|v| v.name == name)
            .ok_or_else(|| InmapError::MissingVariable(name.to_string()))
    }
}

impl DatasetReader for MemoryDataset {
    fn dimension_len(&self, name: &str) -> Option<usize> {
        self.dimensions
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, len)| *len)
    }

    fn variable_dimensions(&self, name: &str) -> Option<Vec<String>> {
        self.variable(name).ok().map(|v| v.dimensions.clone())
    }

    fn variable_attribute(&self, variable: &str, attribute: &str) -> Option<AttributeValue> {
        self.variable(variable).ok().and_then(|v| {
            v.attributes
                .iter()
                .find(|(n, _)| n == attribute)
                .map(|(_, value)| value.clone())
        })
    }

    fn global_attributes(&self) -> Vec<(String, AttributeValue)> {
        self.global_attributes.clone()
    }

    fn read(&self, name: &str) -> InmapResult<ArrayD<FloatValue>> {
        Ok(self.variable(name)?.values.clone())
    }

    fn read_text(&self, name: &str) -> InmapResult<Vec<String>> {
        self.text_variables
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.clone())
            .ok_or_else(|| InmapError::MissingVariable(name.to_string()))
    }
}

impl DatasetWriter for MemoryDataset {
    fn create_dimension(&mut self, name: &str, len: usize) -> InmapResult<()> {
        if self.dimension_len(name).is_some() {
            return Err(InmapError::Error(format!(
                "Dimension {} already exists",
                name
            )));
        }
        self.dimensions.push((name.to_string(), len));
        Ok(())
    }

    fn create_variable(
        &mut self,
        name: &str,
        dimensions: &[&str],
        attributes: &VariableAttributes,
    ) -> InmapResult<()> {
        if self.has_variable(name) {
            return Err(InmapError::DuplicateVariable(name.to_string()));
        }
        let shape = dimensions
            .iter()
            .map(|d| {
                self.dimension_len(d)
                    .ok_or_else(|| InmapError::MissingDimension(d.to_string()))
            })
            .collect::<InmapResult<Vec<usize>>>()?;

        self.variables.push(MemoryVariable {
            name: name.to_string(),
            dimensions: dimensions.iter().map(|d| d.to_string()).collect(),
            attributes: attributes.to_pairs(),
            values: ArrayD::zeros(IxDyn(&shape)),
        });
        Ok(())
    }

    fn set_global_attribute(&mut self, name: &str, value: AttributeValue) -> InmapResult<()> {
        self.insert_global_attribute(name, value);
        Ok(())
    }

    fn variable_shape(&self, name: &str) -> InmapResult<Vec<usize>> {
        Ok(self.variable(name)?.values.shape().to_vec())
    }

    fn write(&mut self, name: &str, values: ArrayViewD<FloatValue>) -> InmapResult<()> {
        let variable = self.variable_mut(name)?;
        if variable.values.shape() != values.shape() {
            return Err(InmapError::ShapeMismatch {
                variable: name.to_string(),
                expected: variable.values.shape().to_vec(),
                found: values.shape().to_vec(),
            });
        }
        variable.values.assign(&values);
        Ok(())
    }

    fn sync(&mut self) -> InmapResult<()> {
        self.sync_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    #[test]
    fn attribute_conversions() {
        assert_eq!(AttributeValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(AttributeValue::Float(3.0).as_i64(), Some(3));
        assert_eq!(AttributeValue::Float(3.5).as_i64(), None);
        assert_eq!(AttributeValue::Floats(vec![2.5]).as_f64(), Some(2.5));
        assert_eq!(AttributeValue::Floats(vec![1.0, 2.0]).as_f64(), None);
        assert_eq!(AttributeValue::from("abc").as_str(), Some("abc"));
    }

    #[test]
    fn created_variables_start_at_zero() {
        let mut ds = MemoryDataset::new();
        ds.create_dimension("Time", 2).unwrap();
        ds.create_dimension("west_east", 3).unwrap();
        ds.create_variable(
            "T2",
            &["Time", "west_east"],
            &VariableAttributes::new("temp", "K"),
        )
        .unwrap();

        assert_eq!(ds.variable_shape("T2").unwrap(), vec![2, 3]);
        assert!(ds.read("T2").unwrap().iter().all(|v| *v == 0.0));
        assert_eq!(
            ds.variable_attribute("T2", "units"),
            Some(AttributeValue::from("K"))
        );
    }

    #[test]
    fn create_variable_needs_dimensions() {
        let mut ds = MemoryDataset::new();
        let res = ds.create_variable("X", &["Time"], &VariableAttributes::default());
        assert!(matches!(res, Err(InmapError::MissingDimension(_))));
    }

    #[test]
    fn duplicate_variables_are_rejected() {
        let mut ds = MemoryDataset::new();
        ds.create_dimension("Time", 1).unwrap();
        let attrs = VariableAttributes::default();
        ds.create_variable("X", &["Time"], &attrs).unwrap();
        assert!(matches!(
            ds.create_variable("X", &["Time"], &attrs),
            Err(InmapError::DuplicateVariable(_))
        ));
    }

    #[test]
    fn write_checks_shape() {
        let mut ds = MemoryDataset::new();
        ds.create_dimension("Time", 2).unwrap();
        ds.create_variable("X", &["Time"], &VariableAttributes::default())
            .unwrap();

        let wrong = Array::from_elem(IxDyn(&[3]), 1.0);
        assert!(matches!(
            ds.write("X", wrong.view()),
            Err(InmapError::ShapeMismatch { .. })
        ));

        let right = Array::from_elem(IxDyn(&[2]), 1.0);
        ds.write("X", right.view()).unwrap();
        assert_eq!(ds.read("X").unwrap(), right);
    }

    #[test]
    fn insert_variable_checks_existing_dimensions() {
        let mut ds = MemoryDataset::new();
        ds.insert_variable("A", &["x"], ArrayD::zeros(IxDyn(&[4])))
            .unwrap();
        assert_eq!(ds.dimension_len("x"), Some(4));
        assert!(ds
            .insert_variable("B", &["x"], ArrayD::zeros(IxDyn(&[5])))
            .is_err());
    }

    #[test]
    fn ioapi_attributes_are_trimmed() {
        let mut ds = MemoryDataset::new();
        ds.insert_variable("NO2", &["x"], ArrayD::zeros(IxDyn(&[1])))
            .unwrap();
        ds.insert_variable_attribute("NO2", "var_desc", "nitrogen dioxide    ".into())
            .unwrap();
        ds.insert_variable_attribute("NO2", "units", "ppmV            ".into())
            .unwrap();

        let attrs = VariableAttributes::from_ioapi(&ds, "NO2");
        assert_eq!(attrs, VariableAttributes::new("nitrogen dioxide", "ppmV"));
    }

    #[test]
    fn wrf_attribute_pairs() {
        let attrs = VariableAttributes {
            description: "x-wind component".into(),
            units: "m s-1".into(),
            stagger: Some("X".into()),
            coordinates: None,
            field_type: Some(104),
            memory_order: Some("XYZ".into()),
        };
        let names: Vec<String> = attrs.to_pairs().into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec!["description", "units", "stagger", "FieldType", "MemoryOrder"]
        );
    }
}
