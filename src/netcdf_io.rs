//! NetCDF backend for the dataset traits
//!
//! [`NetcdfReader`] wraps a read-only WRF, MCIP or CMAQ file. [`NetcdfWriter`] owns the
//! output file and can read back what it has written, which the partition step
//! needs. Values are read as `f64` whatever their on-disk type and written as
//! `f32`.
//!
//! NetCDF files are only guaranteed to be complete on disk once closed, so
//! [`DatasetWriter::sync`] closes the output and reopens it for appending.

use inmap_prep_core::dataset::{AttributeValue, DatasetReader, DatasetWriter, VariableAttributes};
use inmap_prep_core::errors::{InmapError, InmapResult};
use inmap_prep_core::FloatValue;
use ndarray::{ArrayD, ArrayViewD, IxDyn};
use std::path::{Path, PathBuf};
use tracing::debug;

fn netcdf_error(context: &str) -> impl Fn(netcdf::Error) -> InmapError + '_ {
    move |e| InmapError::Error(format!("NetCDF error {}: {}", context, e))
}

fn from_netcdf_attribute(value: netcdf::AttributeValue) -> Option<AttributeValue> {
    use netcdf::AttributeValue as Nc;
    let value = match value {
        Nc::Str(v) => AttributeValue::Text(v),
        Nc::Strs(v) => AttributeValue::Text(v.join(",")),
        Nc::Short(v) => AttributeValue::Int(v.into()),
        Nc::Int(v) => AttributeValue::Int(v.into()),
        Nc::Longlong(v) => AttributeValue::Int(v),
        Nc::Shorts(v) => AttributeValue::Ints(v.into_iter().map(i64::from).collect()),
        Nc::Ints(v) => AttributeValue::Ints(v.into_iter().map(i64::from).collect()),
        Nc::Longlongs(v) => AttributeValue::Ints(v),
        Nc::Float(v) => AttributeValue::Float(v.into()),
        Nc::Double(v) => AttributeValue::Float(v),
        Nc::Floats(v) => AttributeValue::Floats(v.into_iter().map(f64::from).collect()),
        Nc::Doubles(v) => AttributeValue::Floats(v),
        _ => return None,
    };
    Some(value)
}

fn to_netcdf_attribute(value: AttributeValue) -> netcdf::AttributeValue {
    use netcdf::AttributeValue as Nc;
    match value {
        AttributeValue::Text(v) => Nc::Str(v),
        AttributeValue::Int(v) => match i32::try_from(v) {
            Ok(v) => Nc::Int(v),
            Err(_) => Nc::Longlong(v),
        },
        AttributeValue::Ints(v) => Nc::Longlongs(v),
        AttributeValue::Float(v) => Nc::Double(v),
        AttributeValue::Floats(v) => Nc::Doubles(v),
    }
}

fn dimension_len(file: &netcdf::File, name: &str) -> Option<usize> {
    file.dimension(name).map(|d| d.len())
}

fn variable_dimensions(file: &netcdf::File, name: &str) -> Option<Vec<String>> {
    file.variable(name)
        .map(|v| v.dimensions().iter().map(|d| d.name().to_string()).collect())
}

fn variable_shape(file: &netcdf::File, name: &str) -> InmapResult<Vec<usize>> {
    file.variable(name)
        .map(|v| v.dimensions().iter().map(|d| d.len()).collect())
        .ok_or_else(|| InmapError::MissingVariable(name.to_string()))
}

fn variable_attribute(file: &netcdf::File, variable: &str, attribute: &str) -> Option<AttributeValue> {
    file.variable(variable)?
        .attribute_value(attribute)?
        .ok()
        .and_then(from_netcdf_attribute)
}

fn global_attributes(file: &netcdf::File) -> Vec<(String, AttributeValue)> {
    file.attributes()
        .filter_map(|attr| {
            let value = attr.value().ok().and_then(from_netcdf_attribute)?;
            Some((attr.name().to_string(), value))
        })
        .collect()
}

fn read(file: &netcdf::File, name: &str) -> InmapResult<ArrayD<FloatValue>> {
    let var = file
        .variable(name)
        .ok_or_else(|| InmapError::MissingVariable(name.to_string()))?;
    let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    let values: Vec<FloatValue> = var.get_values(..).map_err(netcdf_error(name))?;
    Ok(ArrayD::from_shape_vec(IxDyn(&shape), values)?)
}

/// Split a `char` variable into one string per leading index
fn read_text(file: &netcdf::File, name: &str) -> InmapResult<Vec<String>> {
    let var = file
        .variable(name)
        .ok_or_else(|| InmapError::MissingVariable(name.to_string()))?;
    let width = var.dimensions().last().map(|d| d.len()).unwrap_or(0);
    if width == 0 {
        return Ok(Vec::new());
    }
    let bytes = var.get_raw_values(..).map_err(netcdf_error(name))?;
    Ok(bytes
        .chunks(width)
        .map(|chunk| {
            String::from_utf8_lossy(chunk)
                .trim_end_matches(&['\0', ' '][..])
                .to_string()
        })
        .collect())
}

/// Read-only NetCDF input
pub struct NetcdfReader {
    file: netcdf::File,
}

impl NetcdfReader {
    pub fn open(path: impl AsRef<Path>) -> InmapResult<Self> {
        let path = path.as_ref();
        let file = netcdf::open(path).map_err(netcdf_error(&path.display().to_string()))?;
        Ok(Self { file })
    }
}

impl DatasetReader for NetcdfReader {
    fn dimension_len(&self, name: &str) -> Option<usize> {
        dimension_len(&self.file, name)
    }

    fn variable_dimensions(&self, name: &str) -> Option<Vec<String>> {
        variable_dimensions(&self.file, name)
    }

    fn variable_attribute(&self, variable: &str, attribute: &str) -> Option<AttributeValue> {
        variable_attribute(&self.file, variable, attribute)
    }

    fn global_attributes(&self) -> Vec<(String, AttributeValue)> {
        global_attributes(&self.file)
    }

    fn read(&self, name: &str) -> InmapResult<ArrayD<FloatValue>> {
        read(&self.file, name)
    }

    fn read_text(&self, name: &str) -> InmapResult<Vec<String>> {
        read_text(&self.file, name)
    }
}

/// NetCDF output file
///
/// Fails on creation if the file already exists.
pub struct NetcdfWriter {
    path: PathBuf,
    file: Option<netcdf::FileMut>,
}

impl NetcdfWriter {
    pub fn create(path: impl AsRef<Path>) -> InmapResult<Self> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            return Err(InmapError::Config(format!(
                "Output file {} already exists",
                path.display()
            )));
        }
        let file = netcdf::create(&path).map_err(netcdf_error("creating output"))?;
        Ok(Self {
            path,
            file: Some(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&self) -> InmapResult<&netcdf::FileMut> {
        self.file
            .as_ref()
            .ok_or_else(|| InmapError::Error(format!("{} is closed", self.path.display())))
    }

    fn file_mut(&mut self) -> InmapResult<&mut netcdf::FileMut> {
        let path = &self.path;
        self.file
            .as_mut()
            .ok_or_else(|| InmapError::Error(format!("{} is closed", path.display())))
    }

    fn put(&mut self, name: &str, values: &[f32]) -> InmapResult<()> {
        let mut var = self
            .file_mut()?
            .variable_mut(name)
            .ok_or_else(|| InmapError::MissingVariable(name.to_string()))?;
        var.put_values(values, ..).map_err(netcdf_error(name))?;
        Ok(())
    }
}

impl DatasetReader for NetcdfWriter {
    fn dimension_len(&self, name: &str) -> Option<usize> {
        self.file().ok().and_then(|f| dimension_len(f, name))
    }

    fn variable_dimensions(&self, name: &str) -> Option<Vec<String>> {
        self.file().ok().and_then(|f| variable_dimensions(f, name))
    }

    fn variable_attribute(&self, variable: &str, attribute: &str) -> Option<AttributeValue> {
        self.file()
            .ok()
            .and_then(|f| variable_attribute(f, variable, attribute))
    }

    fn global_attributes(&self) -> Vec<(String, AttributeValue)> {
        self.file().map(|f| global_attributes(f)).unwrap_or_default()
    }

    fn read(&self, name: &str) -> InmapResult<ArrayD<FloatValue>> {
        read(self.file()?, name)
    }

    fn read_text(&self, name: &str) -> InmapResult<Vec<String>> {
        read_text(self.file()?, name)
    }
}

impl DatasetWriter for NetcdfWriter {
    fn create_dimension(&mut self, name: &str, len: usize) -> InmapResult<()> {
        self.file_mut()?
            .add_dimension(name, len)
            .map_err(netcdf_error(name))?;
        Ok(())
    }

    fn create_variable(
        &mut self,
        name: &str,
        dimensions: &[&str],
        attributes: &VariableAttributes,
    ) -> InmapResult<()> {
        let file = self.file_mut()?;
        if file.variable(name).is_some() {
            return Err(InmapError::DuplicateVariable(name.to_string()));
        }
        let mut len = 1;
        for dimension in dimensions {
            len *= dimension_len(file, dimension)
                .ok_or_else(|| InmapError::MissingDimension(dimension.to_string()))?;
        }

        {
            let mut var = file
                .add_variable::<f32>(name, dimensions)
                .map_err(netcdf_error(name))?;
            for (key, value) in attributes.to_pairs() {
                var.put_attribute(&key, to_netcdf_attribute(value))
                    .map_err(netcdf_error(name))?;
            }
        }
        self.put(name, &vec![0.0; len])
    }

    fn set_global_attribute(&mut self, name: &str, value: AttributeValue) -> InmapResult<()> {
        self.file_mut()?
            .add_attribute(name, to_netcdf_attribute(value))
            .map_err(netcdf_error(name))?;
        Ok(())
    }

    fn variable_shape(&self, name: &str) -> InmapResult<Vec<usize>> {
        variable_shape(self.file()?, name)
    }

    fn write(&mut self, name: &str, values: ArrayViewD<FloatValue>) -> InmapResult<()> {
        let shape = self.variable_shape(name)?;
        if values.shape() != shape.as_slice() {
            return Err(InmapError::ShapeMismatch {
                variable: name.to_string(),
                expected: shape,
                found: values.shape().to_vec(),
            });
        }
        let data: Vec<f32> = values.iter().map(|v| *v as f32).collect();
        self.put(name, &data)
    }

    fn sync(&mut self) -> InmapResult<()> {
        // Closing the handle flushes everything to disk
        drop(self.file.take());
        let file = netcdf::append(&self.path).map_err(netcdf_error("reopening output"))?;
        self.file = Some(file);
        debug!(path = %self.path.display(), "synced output");
        Ok(())
    }
}
