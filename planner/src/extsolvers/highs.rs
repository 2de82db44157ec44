use std::convert::TryFrom;
use std::ffi::{c_void, CString};
use std::fmt::{Debug, Formatter};
use std::os::raw::c_int;

use highs_sys::*;
use log::{trace, warn};

use super::{LPSolver, LpError};

pub struct HighsSolverInstance {
    ptr: *mut c_void,
}

impl Drop for HighsSolverInstance {
    fn drop(&mut self) {
        unsafe {
            highs_sys::Highs_destroy(self.ptr);
        }
    }
}

impl Default for HighsSolverInstance {
    fn default() -> Self {
        <Self as LPSolver>::new()
    }
}

fn option_name(name: &str) -> CString {
    // Option names are static ASCII without interior nul bytes.
    CString::new(name).unwrap_or_default()
}

fn check(call: &'static str, status: HighsInt) -> Result<(), LpError> {
    match HighsStatus::try_from(status) {
        Ok(HighsStatus::OK) => Ok(()),
        Ok(HighsStatus::Warning) => {
            warn!("{} returned a warning", call);
            Ok(())
        }
        _ => Err(LpError::Call { call, status }),
    }
}

impl HighsSolverInstance {
    fn set_string_option(&mut self, name: &str, value: &str) {
        let name = option_name(name);
        let value = option_name(value);
        unsafe { highs_sys::Highs_setStringOptionValue(self.ptr, name.as_ptr(), value.as_ptr()) };
    }

    fn highs_solve(&mut self) -> Result<HighsModelStatus, InvalidStatus> {
        let _retval = unsafe { highs_sys::Highs_run(self.ptr) };
        let model_status_retval = unsafe { highs_sys::Highs_getModelStatus(self.ptr) };
        HighsModelStatus::try_from(model_status_retval)
    }

    fn objective_value(&self) -> f64 {
        let name = option_name("objective_function_value");
        let mut objective_value = 0.0f64;
        unsafe { highs_sys::Highs_getDoubleInfoValue(self.ptr, name.as_ptr(), &mut objective_value) };
        objective_value
    }
}

impl LPSolver for HighsSolverInstance {
    fn new() -> Self {
        let ptr = unsafe { highs_sys::Highs_create() };
        let mut lp = Self { ptr };
        lp.set_string_option("presolve", "on");
        let output_flag = option_name("output_flag");
        unsafe { highs_sys::Highs_setBoolOptionValue(lp.ptr, output_flag.as_ptr(), 0) };
        lp
    }

    fn inf(&self) -> f64 {
        unsafe { highs_sys::Highs_getInfinity(self.ptr) }
    }

    fn num_cols(&self) -> usize {
        (unsafe { highs_sys::Highs_getNumCol(self.ptr) }) as usize
    }

    fn num_rows(&self) -> usize {
        (unsafe { highs_sys::Highs_getNumRow(self.ptr) }) as usize
    }

    fn add_column(&mut self, cost: f64, idxs: &[i32], coeffs: &[f64]) -> Result<u32, LpError> {
        let new_col_idx = self.num_cols() as u32;
        let inf = self.inf();
        debug_assert!(idxs.len() == coeffs.len());
        let retval = unsafe {
            highs_sys::Highs_addCol(
                self.ptr,
                cost,
                0.0,
                inf,
                idxs.len() as HighsInt,
                idxs.as_ptr(),
                coeffs.as_ptr(),
            )
        };
        check("Highs_addCol", retval)?;
        Ok(new_col_idx)
    }

    fn add_empty_constr(&mut self, lb: f64, ub: f64) -> Result<u32, LpError> {
        let new_row_idx = self.num_rows() as u32;
        let retval =
            unsafe { highs_sys::Highs_addRow(self.ptr, lb, ub, 0, std::ptr::null(), std::ptr::null()) };
        check("Highs_addRow", retval)?;
        Ok(new_row_idx)
    }

    fn set_constr_bounds(&mut self, row: u32, lb: f64, ub: f64) -> Result<(), LpError> {
        let retval = unsafe { highs_sys::Highs_changeRowBounds(self.ptr, row as HighsInt, lb, ub) };
        check("Highs_changeRowBounds", retval)
    }

    fn write_model(&mut self, path: &str) -> Result<(), LpError> {
        #[cfg(feature = "prof")]
        let _p = hprof::enter("write model");
        let filename = CString::new(path).map_err(|_| LpError::InvalidPath(path.to_string()))?;
        let retval = unsafe { highs_sys::Highs_writeModel(self.ptr, filename.as_ptr()) };
        check("Highs_writeModel", retval)?;
        trace!("model saved to {}", path);
        Ok(())
    }

    fn primal(&self) -> Vec<f64> {
        let mut values = vec![0.0; self.num_cols()];
        if !values.is_empty() {
            let null = std::ptr::null_mut();
            unsafe { highs_sys::Highs_getSolution(self.ptr, values.as_mut_ptr(), null, null, null) };
        }
        values
    }

    fn duals(&self) -> Vec<f64> {
        let mut duals = vec![0.0; self.num_rows()];
        if !duals.is_empty() {
            let null = std::ptr::null_mut();
            unsafe { highs_sys::Highs_getSolution(self.ptr, null, null, null, duals.as_mut_ptr()) };
        }
        duals
    }

    fn optimize(&mut self) -> Result<f64, LpError> {
        #[cfg(feature = "prof")]
        let _p = hprof::enter("lp optimize");

        let mut model_status = self.highs_solve();

        if model_status == Ok(HighsModelStatus::Unknown) {
            // Seen on degenerate masters; a looser dual tolerance usually recovers.
            warn!("HiGHS returned unknown status, retrying with reduced dual feasibility tolerance");
            let name = option_name("dual_feasibility_tolerance");
            unsafe { highs_sys::Highs_setDoubleOptionValue(self.ptr, name.as_ptr(), 0.02) };
            model_status = self.highs_solve();
        }

        match model_status {
            Ok(HighsModelStatus::Optimal) | Ok(HighsModelStatus::ModelEmpty) => Ok(self.objective_value()),
            Ok(HighsModelStatus::Infeasible) => Err(LpError::Infeasible),
            Ok(HighsModelStatus::Unbounded) | Ok(HighsModelStatus::UnboundedOrInfeasible) => {
                Err(LpError::Unbounded)
            }
            Ok(other) => Err(LpError::Status(format!("{:?}", other))),
            Err(invalid) => Err(LpError::Status(format!("{:?}", invalid))),
        }
    }
}

/// The kinds of results of an optimization
#[derive(Clone, Copy, Debug, PartialOrd, PartialEq, Ord, Eq)]
pub enum HighsModelStatus {
    NotSet = MODEL_STATUS_NOTSET as isize,
    LoadError = MODEL_STATUS_LOAD_ERROR as isize,
    ModelError = MODEL_STATUS_MODEL_ERROR as isize,
    PresolveError = MODEL_STATUS_PRESOLVE_ERROR as isize,
    SolveError = MODEL_STATUS_SOLVE_ERROR as isize,
    PostsolveError = MODEL_STATUS_POSTSOLVE_ERROR as isize,
    /// No variables in the model
    ModelEmpty = MODEL_STATUS_MODEL_EMPTY as isize,
    Infeasible = MODEL_STATUS_INFEASIBLE as isize,
    UnboundedOrInfeasible = MODEL_STATUS_UNBOUNDED_OR_INFEASIBLE as isize,
    Unbounded = MODEL_STATUS_UNBOUNDED as isize,
    Optimal = MODEL_STATUS_OPTIMAL as isize,
    ObjectiveBound = MODEL_STATUS_OBJECTIVE_BOUND as isize,
    ObjectiveTarget = MODEL_STATUS_OBJECTIVE_TARGET as isize,
    ReachedTimeLimit = MODEL_STATUS_REACHED_TIME_LIMIT as isize,
    ReachedIterationLimit = MODEL_STATUS_REACHED_ITERATION_LIMIT as isize,
    Unknown = MODEL_STATUS_UNKNOWN as isize,
}

#[derive(PartialEq, Clone, Copy)]
pub struct InvalidStatus(pub c_int);

impl Debug for InvalidStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} is not a valid HiGHS model status", self.0)
    }
}

impl TryFrom<c_int> for HighsModelStatus {
    type Error = InvalidStatus;

    fn try_from(value: c_int) -> Result<Self, Self::Error> {
        match value {
            MODEL_STATUS_NOTSET => Ok(Self::NotSet),
            MODEL_STATUS_LOAD_ERROR => Ok(Self::LoadError),
            MODEL_STATUS_MODEL_ERROR => Ok(Self::ModelError),
            MODEL_STATUS_PRESOLVE_ERROR => Ok(Self::PresolveError),
            MODEL_STATUS_SOLVE_ERROR => Ok(Self::SolveError),
            MODEL_STATUS_POSTSOLVE_ERROR => Ok(Self::PostsolveError),
            MODEL_STATUS_MODEL_EMPTY => Ok(Self::ModelEmpty),
            MODEL_STATUS_INFEASIBLE => Ok(Self::Infeasible),
            MODEL_STATUS_UNBOUNDED => Ok(Self::Unbounded),
            MODEL_STATUS_UNBOUNDED_OR_INFEASIBLE => Ok(Self::UnboundedOrInfeasible),
            MODEL_STATUS_OPTIMAL => Ok(Self::Optimal),
            MODEL_STATUS_OBJECTIVE_BOUND => Ok(Self::ObjectiveBound),
            MODEL_STATUS_OBJECTIVE_TARGET => Ok(Self::ObjectiveTarget),
            MODEL_STATUS_REACHED_TIME_LIMIT => Ok(Self::ReachedTimeLimit),
            MODEL_STATUS_REACHED_ITERATION_LIMIT => Ok(Self::ReachedIterationLimit),
            MODEL_STATUS_UNKNOWN => Ok(Self::Unknown),
            n => Err(InvalidStatus(n)),
        }
    }
}

/// The status of a highs operation
#[derive(Clone, Copy, Debug, PartialOrd, PartialEq, Ord, Eq)]
pub enum HighsStatus {
    OK = 0,
    Warning = 1,
    Error = 2,
}

impl TryFrom<c_int> for HighsStatus {
    type Error = InvalidStatus;

    fn try_from(value: c_int) -> Result<Self, InvalidStatus> {
        match value {
            STATUS_OK => Ok(Self::OK),
            STATUS_WARNING => Ok(Self::Warning),
            STATUS_ERROR => Ok(Self::Error),
            n => Err(InvalidStatus(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_covering_lp_duals() {
        // min 2x + 3y  s.t.  x + y >= 1,  x >= 0.5
        let mut lp = <HighsSolverInstance as LPSolver>::new();
        let inf = lp.inf();
        let r0 = lp.add_empty_constr(1.0, inf).unwrap();
        let r1 = lp.add_empty_constr(0.5, inf).unwrap();
        assert_eq!(lp.add_column(2.0, &[r0 as i32, r1 as i32], &[1.0, 1.0]), Ok(0));
        assert_eq!(lp.add_column(3.0, &[r0 as i32], &[1.0]), Ok(1));
        let obj = lp.optimize().unwrap();
        assert!((obj - 2.0).abs() < 1e-7);
        let x = lp.primal();
        assert!((x[0] - 1.0).abs() < 1e-7);
        assert!(x[1].abs() < 1e-7);
        assert_eq!(lp.num_rows(), 2);

        lp.set_constr_bounds(r1, 2.0, inf).unwrap();
        let obj = lp.optimize().unwrap();
        assert!((obj - 4.0).abs() < 1e-7);
        let y = lp.duals();
        // Row 1 carries the whole marginal cost of x.
        assert!((y[1] - 2.0).abs() < 1e-7);
        assert!(y[0].abs() < 1e-7);
    }

    #[test]
    fn test_infeasible_rows() {
        let mut lp = <HighsSolverInstance as LPSolver>::new();
        let r0 = lp.add_empty_constr(1.0, 1.0).unwrap();
        let r1 = lp.add_empty_constr(3.0, 3.0).unwrap();
        lp.add_column(1.0, &[r0 as i32, r1 as i32], &[1.0, 1.0]).unwrap();
        assert!(matches!(lp.optimize(), Err(LpError::Infeasible) | Err(LpError::Unbounded)));
    }

    #[test]
    fn test_bad_calls_are_errors() {
        let mut lp = <HighsSolverInstance as LPSolver>::new();
        let r0 = lp.add_empty_constr(1.0, 2.0).unwrap();
        // Row 7 does not exist.
        assert!(matches!(
            lp.add_column(1.0, &[r0 as i32, 7], &[1.0, 1.0]),
            Err(LpError::Call { call: "Highs_addCol", .. })
        ));
        assert!(lp.set_constr_bounds(9, 0.0, 1.0).is_err());
        assert_eq!(
            lp.write_model("bad\0name.lp"),
            Err(LpError::InvalidPath("bad\0name.lp".to_string()))
        );
    }
}
