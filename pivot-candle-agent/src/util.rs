//! Utilities.
use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor, Var};
use candle_nn::VarMap;
use log::trace;
use ndarray::Array2;
use std::collections::BTreeMap;

/// Apply soft update on variables.
///
/// Variables are identified by their names.
///
/// dest = tau * src + (1.0 - tau) * dest
pub fn track(dest: &VarMap, src: &VarMap, tau: f64) -> Result<()> {
    let dest = dest.data().lock().map_err(|e| anyhow!("{}", e))?;
    let src = src.data().lock().map_err(|e| anyhow!("{}", e))?;
    trace!("Soft update of {} variables, tau = {}", dest.len(), tau);

    for (k_dest, v_dest) in dest.iter() {
        let v_src = src
            .get(k_dest)
            .ok_or_else(|| anyhow!("Variable {} is missing in the source", k_dest))?;
        let t_src = v_src.as_tensor();
        let t_dest = v_dest.as_tensor();
        let t_dest = ((tau * t_src)? + ((1.0 - tau) * t_dest)?)?;
        v_dest.set(&t_dest)?;
    }

    Ok(())
}

/// Variables whose names start with `prefix`, sorted by name.
pub fn vars_with_prefix(varmap: &VarMap, prefix: &str) -> Result<Vec<Var>> {
    let data = varmap.data().lock().map_err(|e| anyhow!("{}", e))?;
    let vars = data
        .iter()
        .filter(|(k, _)| k.starts_with(prefix))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect::<BTreeMap<_, _>>();
    Ok(vars.into_values().collect())
}

/// Converts a 2-dimensional array to a tensor.
pub fn array2_to_tensor(a: &Array2<f32>, device: &Device) -> Result<Tensor> {
    let shape = (a.nrows(), a.ncols());
    let v = a.iter().copied().collect::<Vec<_>>();
    Ok(Tensor::from_vec(v, shape, device)?)
}

/// Converts a 2-dimensional tensor to an array.
pub fn tensor_to_array2(t: &Tensor) -> Result<Array2<f32>> {
    let (n, m) = t.dims2()?;
    let v: Vec<f32> = t.flatten_all()?.to_vec1()?;
    Ok(Array2::from_shape_vec((n, m), v)?)
}

/// `1 - Var[y - y_pred] / Var[y]`, NaN if `y` is constant.
pub fn explained_variance(y_pred: &[f32], y: &[f32]) -> f32 {
    fn var(xs: impl Iterator<Item = f32> + Clone) -> f32 {
        let n = xs.clone().count() as f32;
        let mean = xs.clone().sum::<f32>() / n;
        xs.map(|x| (x - mean).powi(2)).sum::<f32>() / n
    }
    let var_y = var(y.iter().copied());
    if var_y == 0.0 {
        return f32::NAN;
    }
    let diff = y.iter().zip(y_pred).map(|(y, p)| y - p);
    1.0 - var(diff) / var_y
}
