//! Reading the classifier's weight archive.
//!
//! The archive is an NPZ file whose members are the topology's weight tensors
//! in positional order (`arr_0`, `arr_1`, ...), as written by
//! `numpy.savez(path, *arrays)`. Member names carry no layer information;
//! position alone decides where a tensor goes. `scripts/export_weights.py`
//! produces the archive from a trained `model.weights.h5`.

use std::path::Path;

use tch::{Kind, Tensor};

use super::model::{ModelError, WeightSlot};

pub fn read_positional(path: &Path) -> Result<Vec<Tensor>, ModelError> {
    if !path.is_file() {
        return Err(ModelError::WeightsNotFound(path.to_path_buf()));
    }
    let entries = Tensor::read_npz(path).map_err(|e| {
        ModelError::WeightsLoad(format!("cannot read {}: {}", path.display(), e))
    })?;
    Ok(order_positional(entries)
        .into_iter()
        .map(|tensor| tensor.to_kind(Kind::Float))
        .collect())
}

/// Sorts `arr_<n>` members by `n`. Archives with other member names keep
/// their stored order.
pub fn order_positional<T>(entries: Vec<(String, T)>) -> Vec<T> {
    let indices: Option<Vec<usize>> = entries
        .iter()
        .map(|(name, _)| positional_index(name))
        .collect();

    match indices {
        Some(indices) => {
            let mut keyed: Vec<(usize, T)> = indices
                .into_iter()
                .zip(entries.into_iter().map(|(_, tensor)| tensor))
                .collect();
            keyed.sort_by_key(|(index, _)| *index);
            keyed.into_iter().map(|(_, tensor)| tensor).collect()
        }
        None => entries.into_iter().map(|(_, tensor)| tensor).collect(),
    }
}

fn positional_index(name: &str) -> Option<usize> {
    name.trim_end_matches(".npy")
        .strip_prefix("arr_")?
        .parse()
        .ok()
}

/// Checks every stored shape against the schema before anything is copied.
pub fn check_shapes(slots: &[WeightSlot], shapes: &[Vec<i64>]) -> Result<(), ModelError> {
    if slots.len() != shapes.len() {
        return Err(ModelError::WeightsLoad(format!(
            "expected {} weight tensors, found {}",
            slots.len(),
            shapes.len()
        )));
    }

    for (position, (slot, shape)) in slots.iter().zip(shapes).enumerate() {
        if slot.shape != *shape {
            return Err(ModelError::WeightsLoad(format!(
                "tensor {} ({}/{}) has shape {:?}, expected {:?}",
                position, slot.layer, slot.role, shape, slot.shape
            )));
        }
    }
    Ok(())
}
