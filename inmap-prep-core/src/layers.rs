//! Vertical layer mapping from source levels to output levels
//!
//! A layer map is read from a CSV file with two one-based columns:
//!
//! ```text
//! lay1,lay2
//! 1,1
//! 2,2
//! 4,3
//! ```
//!
//! `lay1` is the source layer and `lay2` the output layer it feeds. When the source
//! and output layer counts are equal the identity mapping is used and no file is
//! required.

use crate::errors::{InmapError, InmapResult};
use crate::FloatValue;
use ndarray::{ArrayD, Axis};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct LayerRow {
    lay1: usize,
    lay2: usize,
}

/// Zero-based source layer index for each output layer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerMap {
    source_indices: Vec<usize>,
}

impl LayerMap {
    pub fn identity(layers: usize) -> Self {
        Self {
            source_indices: (0..layers).collect(),
        }
    }

    /// Build a map directly from zero-based source indices
    pub fn from_indices(source_indices: Vec<usize>) -> InmapResult<Self> {
        if source_indices.is_empty() {
            return Err(InmapError::LayerMapping("no output layers".into()));
        }
        Ok(Self { source_indices })
    }

    /// Read a `lay1,lay2` CSV table
    ///
    /// Rows are ordered by `lay2`, which must cover `1..=N` exactly once.
    pub fn from_reader<R: Read>(reader: R) -> InmapResult<Self> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut rows = rdr
            .deserialize::<LayerRow>()
            .collect::<Result<Vec<_>, csv::Error>>()?;
        rows.sort_by_key(|r| r.lay2);

        for (i, row) in rows.iter().enumerate() {
            if row.lay2 != i + 1 {
                return Err(InmapError::LayerMapping(format!(
                    "output layers must be numbered 1..={} without gaps or repeats, found lay2={} at position {}",
                    rows.len(),
                    row.lay2,
                    i + 1
                )));
            }
            if row.lay1 == 0 {
                return Err(InmapError::LayerMapping(format!(
                    "source layer for output layer {} must be one-based",
                    row.lay2
                )));
            }
        }
        Self::from_indices(rows.iter().map(|r| r.lay1 - 1).collect())
    }

    pub fn from_path(path: impl AsRef<Path>) -> InmapResult<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Choose the layer map for a run
    ///
    /// Uses the identity when source and output layer counts agree. Otherwise a map
    /// must be given with one row per output layer and in-range source layers.
    pub fn resolve(
        source_layers: usize,
        output_layers: usize,
        map: Option<LayerMap>,
    ) -> InmapResult<Self> {
        if source_layers == output_layers {
            return Ok(Self::identity(output_layers));
        }
        let map = map.ok_or_else(|| {
            InmapError::LayerMapping(format!(
                "{} source layers differ from {} output layers and no layer map was given",
                source_layers, output_layers
            ))
        })?;
        if map.len() != output_layers {
            return Err(InmapError::LayerMapping(format!(
                "layer map has {} rows but the output has {} layers",
                map.len(),
                output_layers
            )));
        }
        map.check_source_layers(source_layers)?;
        Ok(map)
    }

    /// Fail if any source index is outside `0..source_layers`
    pub fn check_source_layers(&self, source_layers: usize) -> InmapResult<()> {
        match self.source_indices.iter().find(|i| **i >= source_layers) {
            Some(i) => Err(InmapError::LayerMapping(format!(
                "source layer {} is beyond the {} available layers",
                i + 1,
                source_layers
            ))),
            None => Ok(()),
        }
    }

    /// Number of output layers
    pub fn len(&self) -> usize {
        self.source_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source_indices.is_empty()
    }

    pub fn indices(&self) -> &[usize] {
        &self.source_indices
    }

    /// Indices for a vertically staggered field
    ///
    /// The bottom interface is always kept and each mapped layer contributes its
    /// upper interface.
    pub fn staggered(&self) -> Vec<usize> {
        std::iter::once(0)
            .chain(self.source_indices.iter().map(|i| i + 1))
            .collect()
    }

    /// Gather the mapped layers along `axis`
    pub fn gather(
        &self,
        values: &ArrayD<FloatValue>,
        axis: usize,
        staggered: bool,
    ) -> InmapResult<ArrayD<FloatValue>> {
        let indices = if staggered {
            self.staggered()
        } else {
            self.source_indices.clone()
        };
        let available = values.len_of(Axis(axis));
        if let Some(i) = indices.iter().find(|i| **i >= available) {
            return Err(InmapError::LayerMapping(format!(
                "layer index {} out of range for axis of length {}",
                i, available
            )));
        }
        Ok(values.select(Axis(axis), &indices))
    }
}
