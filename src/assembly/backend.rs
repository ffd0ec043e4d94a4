//! Linear-algebra backend: the external distributed solver seen through a
//! trait, plus a serial reference implementation.
//!
//! The crate never reaches into solver internals: it creates vectors and a
//! matrix sized by the DOF partition, sets entries by global index, and asks
//! for a solve. Non-convergence is data ([`SolveStatus`]), not an error;
//! only infrastructure failures surface as `Err`.

use crate::dof::{DofPartition, GlobalDof};
use crate::grid_error::StagGridError;
use log::debug;

/// Outcome of one solve, mapped from the external solver without
/// reinterpretation.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum SolveStatus {
    /// Residual dropped below tolerance.
    Converged { iterations: usize, residual: f64 },
    /// Iteration limit hit; the iterate is defined but not converged.
    Diverged { iterations: usize, residual: f64 },
    /// Numerical breakdown (indefinite operator or non-finite arithmetic);
    /// the iterate is undefined.
    Breakdown { iterations: usize },
}

impl SolveStatus {
    /// Whether the solution vector holds a defined iterate (copy-out is
    /// permitted).
    #[inline]
    pub fn is_defined(&self) -> bool {
        !matches!(self, SolveStatus::Breakdown { .. })
    }

    /// Whether the solve converged.
    #[inline]
    pub fn is_converged(&self) -> bool {
        matches!(self, SolveStatus::Converged { .. })
    }
}

/// Solver configuration carried by a level solver across repeated solves.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SolverOptions {
    /// Iteration cap before reporting `Diverged`.
    pub max_iterations: usize,
    /// Relative residual tolerance (scaled by the right-hand-side norm).
    pub rel_tolerance: f64,
    /// Absolute residual floor.
    pub abs_tolerance: f64,
    /// Use the incoming solution field as the initial guess instead of zero.
    pub initial_guess_nonzero: bool,
    /// Treat boundary conditions homogeneously when adjusting the
    /// right-hand side.
    pub homogeneous_bc: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            rel_tolerance: 1e-10,
            abs_tolerance: 1e-50,
            initial_guess_nonzero: false,
            homogeneous_bc: false,
        }
    }
}

/// Abstract distributed vector/matrix construction and solve primitives.
pub trait LinearBackend {
    type Vector;
    type Matrix;

    /// Create a vector partitioned per the DOF counts.
    fn create_vector(&self, partition: &DofPartition) -> Result<Self::Vector, StagGridError>;

    /// Create a matrix partitioned per the DOF counts.
    fn create_matrix(&self, partition: &DofPartition) -> Result<Self::Matrix, StagGridError>;

    /// Write one vector entry by global index.
    fn vec_set(
        &self,
        v: &mut Self::Vector,
        index: GlobalDof,
        value: f64,
    ) -> Result<(), StagGridError>;

    /// Read one vector entry by global index.
    fn vec_get(&self, v: &Self::Vector, index: GlobalDof) -> Result<f64, StagGridError>;

    /// Replace one matrix row.
    fn mat_set_row(
        &self,
        m: &mut Self::Matrix,
        row: GlobalDof,
        entries: &[(GlobalDof, f64)],
    ) -> Result<(), StagGridError>;

    /// Solve `m x = b`, overwriting `x`.
    fn solve(
        &self,
        m: &Self::Matrix,
        x: &mut Self::Vector,
        b: &Self::Vector,
        opts: &SolverOptions,
    ) -> Result<SolveStatus, StagGridError>;
}

/// In-process reference backend: dense vectors, a row-map matrix, and a
/// conjugate-gradient solve. Supports single-rank partitions only;
/// distributed runs plug in an external backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialBackend;

/// Dense vector over the full global index range.
#[derive(Clone, Debug)]
pub struct SerialVector {
    values: Vec<f64>,
}

impl SerialVector {
    /// The raw values, indexed by global DOF.
    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// Sparse matrix as one entry list per row.
#[derive(Clone, Debug)]
pub struct SerialMatrix {
    rows: Vec<Vec<(usize, f64)>>,
}

impl SerialMatrix {
    fn apply(&self, x: &[f64], y: &mut [f64]) {
        for (row, entries) in self.rows.iter().enumerate() {
            y[row] = entries.iter().map(|&(col, a)| a * x[col]).sum();
        }
    }
}

impl SerialBackend {
    fn check_serial(partition: &DofPartition) -> Result<usize, StagGridError> {
        if partition.local_count() != partition.total() {
            return Err(StagGridError::UnsupportedOperation(
                "SerialBackend requires all dofs on one rank",
            ));
        }
        Ok(partition.total() as usize)
    }

    fn check_index(index: GlobalDof, total: usize) -> Result<usize, StagGridError> {
        let i = index.get() as usize;
        if i >= total {
            return Err(StagGridError::DofOutOfRange {
                index: index.get(),
                total: total as u64,
            });
        }
        Ok(i)
    }
}

impl LinearBackend for SerialBackend {
    type Vector = SerialVector;
    type Matrix = SerialMatrix;

    fn create_vector(&self, partition: &DofPartition) -> Result<SerialVector, StagGridError> {
        let n = Self::check_serial(partition)?;
        Ok(SerialVector {
            values: vec![0.0; n],
        })
    }

    fn create_matrix(&self, partition: &DofPartition) -> Result<SerialMatrix, StagGridError> {
        let n = Self::check_serial(partition)?;
        Ok(SerialMatrix {
            rows: vec![Vec::new(); n],
        })
    }

    fn vec_set(
        &self,
        v: &mut SerialVector,
        index: GlobalDof,
        value: f64,
    ) -> Result<(), StagGridError> {
        let i = Self::check_index(index, v.values.len())?;
        v.values[i] = value;
        Ok(())
    }

    fn vec_get(&self, v: &SerialVector, index: GlobalDof) -> Result<f64, StagGridError> {
        let i = Self::check_index(index, v.values.len())?;
        Ok(v.values[i])
    }

    fn mat_set_row(
        &self,
        m: &mut SerialMatrix,
        row: GlobalDof,
        entries: &[(GlobalDof, f64)],
    ) -> Result<(), StagGridError> {
        let n = m.rows.len();
        let r = Self::check_index(row, n)?;
        let mut converted = Vec::with_capacity(entries.len());
        for &(col, value) in entries {
            converted.push((Self::check_index(col, n)?, value));
        }
        m.rows[r] = converted;
        Ok(())
    }

    fn solve(
        &self,
        m: &SerialMatrix,
        x: &mut SerialVector,
        b: &SerialVector,
        opts: &SolverOptions,
    ) -> Result<SolveStatus, StagGridError> {
        let n = m.rows.len();
        if !opts.initial_guess_nonzero {
            x.values.iter_mut().for_each(|v| *v = 0.0);
        }

        let b_norm = norm(&b.values);
        if b_norm == 0.0 && !opts.initial_guess_nonzero {
            return Ok(SolveStatus::Converged {
                iterations: 0,
                residual: 0.0,
            });
        }
        let tol = (opts.rel_tolerance * b_norm).max(opts.abs_tolerance);

        let mut r = vec![0.0; n];
        m.apply(&x.values, &mut r);
        for i in 0..n {
            r[i] = b.values[i] - r[i];
        }
        let mut p = r.clone();
        let mut ap = vec![0.0; n];
        let mut rr = dot(&r, &r);

        let mut residual = rr.sqrt();
        for it in 0..opts.max_iterations {
            if residual <= tol {
                debug!("cg converged in {it} iterations, residual {residual:e}");
                return Ok(SolveStatus::Converged {
                    iterations: it,
                    residual,
                });
            }
            m.apply(&p, &mut ap);
            let p_ap = dot(&p, &ap);
            if !p_ap.is_finite() || p_ap <= 0.0 {
                return Ok(SolveStatus::Breakdown { iterations: it });
            }
            let alpha = rr / p_ap;
            for i in 0..n {
                x.values[i] += alpha * p[i];
                r[i] -= alpha * ap[i];
            }
            let rr_next = dot(&r, &r);
            if !rr_next.is_finite() {
                return Ok(SolveStatus::Breakdown { iterations: it });
            }
            let beta = rr_next / rr;
            for i in 0..n {
                p[i] = r[i] + beta * p[i];
            }
            rr = rr_next;
            residual = rr.sqrt();
        }
        if residual <= tol {
            return Ok(SolveStatus::Converged {
                iterations: opts.max_iterations,
                residual,
            });
        }
        Ok(SolveStatus::Diverged {
            iterations: opts.max_iterations,
            residual,
        })
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partition(n: u64) -> DofPartition {
        DofPartition::new(vec![n], 0)
    }

    fn backend_with_system(n: usize) -> (SerialBackend, SerialMatrix, SerialVector, SerialVector) {
        let be = SerialBackend;
        let part = partition(n as u64);
        let m = be.create_matrix(&part).unwrap();
        let x = be.create_vector(&part).unwrap();
        let b = be.create_vector(&part).unwrap();
        (be, m, x, b)
    }

    #[test]
    fn cg_solves_spd_tridiagonal() {
        let n = 16;
        let (be, mut m, mut x, mut b) = backend_with_system(n);
        for i in 0..n {
            let mut row = vec![(GlobalDof::new(i as u64), 2.0)];
            if i > 0 {
                row.push((GlobalDof::new(i as u64 - 1), -1.0));
            }
            if i + 1 < n {
                row.push((GlobalDof::new(i as u64 + 1), -1.0));
            }
            be.mat_set_row(&mut m, GlobalDof::new(i as u64), &row).unwrap();
            be.vec_set(&mut b, GlobalDof::new(i as u64), 1.0).unwrap();
        }
        let status = be.solve(&m, &mut x, &b, &SolverOptions::default()).unwrap();
        assert!(status.is_converged(), "status: {status:?}");
        // Residual check: ||b - A x|| must be tiny.
        let mut ax = vec![0.0; n];
        m.apply(x.values(), &mut ax);
        let res: f64 = ax
            .iter()
            .zip(b.values())
            .map(|(a, b)| (b - a) * (b - a))
            .sum::<f64>()
            .sqrt();
        assert!(res < 1e-8, "residual {res}");
    }

    #[test]
    fn indefinite_matrix_reports_breakdown() {
        let (be, mut m, mut x, mut b) = backend_with_system(2);
        be.mat_set_row(&mut m, GlobalDof::new(0), &[(GlobalDof::new(0), -1.0)])
            .unwrap();
        be.mat_set_row(&mut m, GlobalDof::new(1), &[(GlobalDof::new(1), -1.0)])
            .unwrap();
        be.vec_set(&mut b, GlobalDof::new(0), 1.0).unwrap();
        let status = be.solve(&m, &mut x, &b, &SolverOptions::default()).unwrap();
        assert!(matches!(status, SolveStatus::Breakdown { .. }));
        assert!(!status.is_defined());
    }

    #[test]
    fn iteration_cap_reports_diverged() {
        let n = 32;
        let (be, mut m, mut x, mut b) = backend_with_system(n);
        for i in 0..n {
            let mut row = vec![(GlobalDof::new(i as u64), 2.0)];
            if i > 0 {
                row.push((GlobalDof::new(i as u64 - 1), -1.0));
            }
            if i + 1 < n {
                row.push((GlobalDof::new(i as u64 + 1), -1.0));
            }
            be.mat_set_row(&mut m, GlobalDof::new(i as u64), &row).unwrap();
            be.vec_set(&mut b, GlobalDof::new(i as u64), (i % 3) as f64).unwrap();
        }
        let opts = SolverOptions {
            max_iterations: 1,
            rel_tolerance: 1e-14,
            ..SolverOptions::default()
        };
        let status = be.solve(&m, &mut x, &b, &opts).unwrap();
        assert!(matches!(status, SolveStatus::Diverged { .. }));
        assert!(status.is_defined());
    }

    #[test]
    fn distributed_partition_unsupported() {
        let be = SerialBackend;
        let part = DofPartition::new(vec![4, 4], 0);
        assert!(matches!(
            be.create_vector(&part),
            Err(StagGridError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn out_of_range_indices_rejected() {
        let (be, mut m, mut x, _b) = backend_with_system(4);
        assert!(matches!(
            be.vec_set(&mut x, GlobalDof::new(4), 0.0),
            Err(StagGridError::DofOutOfRange { index: 4, total: 4 })
        ));
        assert!(matches!(
            be.mat_set_row(&mut m, GlobalDof::new(0), &[(GlobalDof::new(9), 1.0)]),
            Err(StagGridError::DofOutOfRange { .. })
        ));
    }
}
