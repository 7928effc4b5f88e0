//! Nonlinear least-squares calibration with iterative outlier rejection.

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use nalgebra::{DMatrix, DVector, Dyn, Owned};

use argmin::core::{CostFunction, Error as ArgminError, Executor, Gradient};
use argmin::solver::neldermead::NelderMead;
use argmin::solver::quasinewton::BFGS;

use crate::error::CalibrationError;
use crate::geometry::quaternion::wrapdeg;
use crate::geometry::{RotatorModel, RotatorParams};

use super::drift::estimate_drift;
use super::measurement::Measurement;

/// Optimization method used to fit the rotator parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Levenberg-Marquardt nonlinear least squares, with a central-difference Jacobian.
    LeastSquares,
    /// BFGS minimization of the mean squared residual, with a central-difference gradient.
    Bfgs,
    /// Derivative-free Nelder-Mead simplex minimization of the mean squared residual.
    NelderMead,
}

/// Drives measurement pre-processing, optional drift removal and the outlier-rejection loop.
#[derive(Debug, Clone)]
pub struct Calibrator {
    params0: RotatorParams,
    method: Method,
    iters: usize,
    drift_window: Option<usize>,
}

/// The outcome of a calibration run.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationResult {
    /// The fitted rotator parameters.
    pub params: RotatorParams,
    /// Mean squared residual (degrees^2) of the final iteration.
    pub loss: f64,
    /// Number of measurements retained after the final outlier-rejection pass.
    pub retained: usize,
}

const STEP: f64 = 1e-6;

impl Calibrator {
    /// Builds a calibrator starting from `params0`, with `iters` outlier-rejection rounds
    /// (each restarting from `params0`, not the previous iterate) and no drift removal.
    pub fn new(params0: RotatorParams, method: Method, iters: usize) -> Self {
        Calibrator {
            params0,
            method,
            iters: iters.max(1),
            drift_window: None,
        }
    }

    /// Enables linear encoder-drift removal using `window` points from each end of the data.
    pub fn with_drift_removal(mut self, window: usize) -> Self {
        self.drift_window = Some(window);
        self
    }

    fn drift_for(&self, params: RotatorParams, data: &[Measurement]) -> Vec<(f64, f64)> {
        match self.drift_window {
            Some(window) => estimate_drift(&RotatorModel::new(params), data, window),
            None => vec![(0.0, 0.0); data.len()],
        }
    }

    /// Residual `(az_err, el_err)` per measurement for the given parameter vector.
    fn residuals(&self, v: &[f64; 7], data: &[Measurement]) -> Vec<(f64, f64)> {
        let params = RotatorParams::from_vector(v);
        let model = RotatorModel::new(params);
        let drift = self.drift_for(params, data);
        data.iter()
            .zip(drift.iter())
            .map(|(m, (daz, del))| {
                let (pred_az, pred_el) = model.to_real(m.az_motor - daz, m.el_motor - del, true);
                (wrapdeg(m.az_truth - pred_az), m.el_truth - pred_el)
            })
            .collect()
    }

    fn residual_norms(&self, v: &[f64; 7], data: &[Measurement]) -> Vec<f64> {
        self.residuals(v, data)
            .into_iter()
            .map(|(a, e)| (a * a + e * e).sqrt())
            .collect()
    }

    fn mean_squared_loss(&self, v: &[f64; 7], data: &[Measurement]) -> f64 {
        let res = self.residuals(v, data);
        if res.is_empty() {
            return 0.0;
        }
        let sum: f64 = res.iter().map(|(a, e)| a * a + e * e).sum();
        sum / (2.0 * res.len() as f64)
    }

    fn fit_once(&self, data: &[Measurement]) -> Result<(RotatorParams, f64), CalibrationError> {
        let v0 = self.params0.to_vector();
        match self.method {
            Method::LeastSquares => self.fit_leastsq(&v0, data),
            Method::Bfgs => self.fit_argmin(&v0, data, true),
            Method::NelderMead => self.fit_argmin(&v0, data, false),
        }
    }

    fn fit_leastsq(&self, v0: &[f64; 7], data: &[Measurement]) -> Result<(RotatorParams, f64), CalibrationError> {
        let problem = LeastSquaresResiduals {
            calibrator: self,
            data,
            params: DVector::from_column_slice(v0),
        };
        let (result, report) = LevenbergMarquardt::new().minimize(problem);
        if !report.objective_function.is_finite() {
            return Err(CalibrationError::OptimizerFailed(
                "non-finite objective in leastsq solve".to_owned(),
            ));
        }
        let v: [f64; 7] = result
            .params
            .as_slice()
            .try_into()
            .map_err(|_| CalibrationError::OptimizerFailed("unexpected parameter count".to_owned()))?;
        let params = RotatorParams::from_vector(&v);
        let loss = self.mean_squared_loss(&v, data);
        Ok((params, loss))
    }

    fn fit_argmin(&self, v0: &[f64; 7], data: &[Measurement], bfgs: bool) -> Result<(RotatorParams, f64), CalibrationError> {
        let cost = MeanSquaredCost { calibrator: self, data };
        let init = v0.to_vec();

        if bfgs {
            let init_hessian = DMatrix::<f64>::identity(7, 7);
            let solver = BFGS::new(init_hessian);
            let res = Executor::new(cost, solver)
                .configure(|state| state.param(init).max_iters(200))
                .run()
                .map_err(|e| CalibrationError::OptimizerFailed(e.to_string()))?;
            let v: [f64; 7] = res
                .state()
                .best_param
                .clone()
                .ok_or_else(|| CalibrationError::OptimizerFailed("BFGS produced no result".to_owned()))?
                .as_slice()
                .try_into()
                .map_err(|_| CalibrationError::OptimizerFailed("unexpected parameter count".to_owned()))?;
            let loss = res.state().best_cost;
            Ok((RotatorParams::from_vector(&v), loss))
        } else {
            let mut simplex = Vec::with_capacity(8);
            simplex.push(init.clone());
            for i in 0..7 {
                let mut vertex = init.clone();
                vertex[i] += if vertex[i].abs() > 1e-3 { vertex[i] * 0.05 } else { 0.05 };
                simplex.push(vertex);
            }
            let solver = NelderMead::new(simplex);
            let res = Executor::new(cost, solver)
                .configure(|state| state.max_iters(500))
                .run()
                .map_err(|e| CalibrationError::OptimizerFailed(e.to_string()))?;
            let v: Vec<f64> = res
                .state()
                .best_param
                .clone()
                .ok_or_else(|| CalibrationError::OptimizerFailed("Nelder-Mead produced no result".to_owned()))?;
            let v: [f64; 7] = v
                .as_slice()
                .try_into()
                .map_err(|_| CalibrationError::OptimizerFailed("unexpected parameter count".to_owned()))?;
            let loss = res.state().best_cost;
            Ok((RotatorParams::from_vector(&v), loss))
        }
    }

    /// Runs the outlier-rejection loop: fit, drop points whose residual norm exceeds three times
    /// the median, refit (always restarting from the initial parameters), repeat `iters` times.
    pub fn fit(&self, data: &[Measurement]) -> Result<CalibrationResult, CalibrationError> {
        if data.is_empty() {
            return Err(CalibrationError::NoMeasurements);
        }
        let mut retained: Vec<Measurement> = data.to_vec();
        let (mut params, mut loss) = (self.params0, 0.0);

        for _ in 0..self.iters {
            let (fitted, fitted_loss) = self.fit_once(&retained)?;
            params = fitted;
            loss = fitted_loss;

            let v = params.to_vector();
            let mut norms = self.residual_norms(&v, &retained);
            let median = median(&mut norms);
            let threshold = 3.0 * median;
            retained = retained
                .iter()
                .zip(norms.iter())
                .filter(|(_, &n)| n < threshold)
                .map(|(m, _)| *m)
                .collect();
            if retained.is_empty() {
                return Err(CalibrationError::NoMeasurements);
            }
        }

        Ok(CalibrationResult {
            params,
            loss,
            retained: retained.len(),
        })
    }
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = values.len();
    if n == 0 {
        0.0
    } else if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

struct LeastSquaresResiduals<'a> {
    calibrator: &'a Calibrator,
    data: &'a [Measurement],
    params: DVector<f64>,
}

impl<'a> LeastSquaresProblem<f64, Dyn, Dyn> for LeastSquaresResiduals<'a> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, params: &DVector<f64>) {
        self.params = params.clone();
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        let v: [f64; 7] = self.params.as_slice().try_into().ok()?;
        let res = self.calibrator.residuals(&v, self.data);
        let mut flat = Vec::with_capacity(res.len() * 2);
        for (a, e) in res {
            flat.push(a);
            flat.push(e);
        }
        Some(DVector::from_vec(flat))
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let v: [f64; 7] = self.params.as_slice().try_into().ok()?;
        let base = self.calibrator.residuals(&v, self.data);
        let rows = base.len() * 2;
        let mut jac = DMatrix::<f64>::zeros(rows, 7);
        for j in 0..7 {
            let mut plus = v;
            let mut minus = v;
            plus[j] += STEP;
            minus[j] -= STEP;
            let r_plus = self.calibrator.residuals(&plus, self.data);
            let r_minus = self.calibrator.residuals(&minus, self.data);
            for i in 0..base.len() {
                jac[(2 * i, j)] = (r_plus[i].0 - r_minus[i].0) / (2.0 * STEP);
                jac[(2 * i + 1, j)] = (r_plus[i].1 - r_minus[i].1) / (2.0 * STEP);
            }
        }
        Some(jac)
    }
}

struct MeanSquaredCost<'a> {
    calibrator: &'a Calibrator,
    data: &'a [Measurement],
}

impl<'a> CostFunction for MeanSquaredCost<'a> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> Result<Self::Output, ArgminError> {
        let v: [f64; 7] = params
            .as_slice()
            .try_into()
            .map_err(|_| ArgminError::msg("expected 7 rotator parameters"))?;
        Ok(self.calibrator.mean_squared_loss(&v, self.data))
    }
}

impl<'a> Gradient for MeanSquaredCost<'a> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, params: &Self::Param) -> Result<Self::Gradient, ArgminError> {
        let v: [f64; 7] = params
            .as_slice()
            .try_into()
            .map_err(|_| ArgminError::msg("expected 7 rotator parameters"))?;
        let mut grad = vec![0.0; 7];
        for j in 0..7 {
            let mut plus = v;
            let mut minus = v;
            plus[j] += STEP;
            minus[j] -= STEP;
            let f_plus = self.calibrator.mean_squared_loss(&plus, self.data);
            let f_minus = self.calibrator.mean_squared_loss(&minus, self.data);
            grad[j] = (f_plus - f_minus) / (2.0 * STEP);
        }
        Ok(grad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic(params: RotatorParams, n: usize) -> Vec<Measurement> {
        let model = RotatorModel::new(params);
        (0..n)
            .map(|i| {
                let az = -150.0 + 300.0 * (i as f64) / (n as f64 - 1.0).max(1.0);
                let el = 10.0 + 40.0 * (i as f64) / (n as f64 - 1.0).max(1.0);
                let (az_m, el_m) = model.to_motor(az, el, true);
                Measurement {
                    az_motor: az_m,
                    el_motor: el_m,
                    az_truth: az,
                    el_truth: el,
                    ts: None,
                }
            })
            .collect()
    }

    #[test]
    fn calibration_is_idempotent_at_the_optimum() {
        let truth = RotatorParams {
            az_off: 1.2,
            el_off: -0.6,
            az_gain: 1.003,
            el_gain: 0.997,
            tilt_az: 50.0,
            tilt_angle: 0.8,
            lateral_tilt: 0.2,
        };
        let data = synthetic(truth, 24);
        let calibrator = Calibrator::new(truth, Method::LeastSquares, 1);
        let result = calibrator.fit(&data).unwrap();
        assert!(result.loss < 1e-8, "loss={}", result.loss);
        assert_eq!(result.retained, data.len());
    }

    #[test]
    fn outlier_rejection_never_grows_retained_count() {
        let truth = RotatorParams::default();
        let mut data = synthetic(truth, 20);
        data[5].az_truth += 15.0; // inject an outlier
        let calibrator = Calibrator::new(truth, Method::LeastSquares, 2);
        let result = calibrator.fit(&data).unwrap();
        assert!(result.retained <= data.len());
    }
}
