//! Level solver: lifecycle owner for one (level, operator) linear system.
//!
//! State machine: Uninitialized -> Initialized -> (solve)* -> Uninitialized.
//! `initialize` allocates the DOF index field, partitions it, builds the
//! communication schedules, and assembles the matrix and vectors; `solve`
//! copies in, invokes the backend, and copies out; `deallocate` releases
//! everything. Dropping an initialized solver releases its state the same
//! way. All three entry points are collective across the ranks of the level.

use crate::assembly::backend::{LinearBackend, SolveStatus, SolverOptions};
use crate::assembly::stencil::StencilProvider;
use crate::assembly::{assemble_matrix, copy_from_vec, copy_to_vec, setup_rhs};
use crate::comm::Communicator;
use crate::dof::{DofEntry, DofPartition, assign_level_dofs, resolve_duplicate_dofs};
use crate::grid_error::StagGridError;
use crate::level::patch::PatchLevel;
use crate::level::side_data::LevelData;
use crate::schedule::{SynchSchedule, build_data_synch_schedule, build_ghost_fill_schedule};
use log::debug;

/// Everything owned by an initialized solver, released on deallocation.
struct SolverState<const D: usize, B: LinearBackend> {
    dof: LevelData<D, DofEntry>,
    partition: DofPartition,
    matrix: B::Matrix,
    x: B::Vector,
    b: B::Vector,
    data_synch: SynchSchedule<D>,
    ghost_fill: SynchSchedule<D>,
}

/// Solves one operator on one patch level, owning the DOF index field,
/// distributed vector/matrix handles, and communication schedules for the
/// duration of its initialized state.
pub struct LevelSolver<const D: usize, B, S, C>
where
    B: LinearBackend,
    S: StencilProvider<D>,
    C: Communicator,
{
    level: PatchLevel<D>,
    backend: B,
    stencil: S,
    comm: C,
    options: SolverOptions,
    state: Option<SolverState<D, B>>,
}

impl<const D: usize, B, S, C> LevelSolver<D, B, S, C>
where
    B: LinearBackend,
    S: StencilProvider<D>,
    C: Communicator,
{
    /// Create an uninitialized solver for `level`.
    pub fn new(level: PatchLevel<D>, backend: B, stencil: S, comm: C, options: SolverOptions) -> Self {
        Self {
            level,
            backend,
            stencil,
            comm,
            options,
            state: None,
        }
    }

    /// Whether the solver holds an initialized state.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// The level this solver operates on.
    #[inline]
    pub fn level(&self) -> &PatchLevel<D> {
        &self.level
    }

    /// The DOF partition of the current initialized state.
    pub fn partition(&self) -> Option<&DofPartition> {
        self.state.as_ref().map(|s| &s.partition)
    }

    /// The DOF index field of the current initialized state.
    pub fn dof_field(&self) -> Option<&LevelData<D, DofEntry>> {
        self.state.as_ref().map(|s| &s.dof)
    }

    /// Build the solver state: DOF numbering, schedules, matrix and vectors.
    ///
    /// # Errors
    /// `AlreadyInitialized` when called twice without an intervening
    /// [`deallocate`](Self::deallocate), which is a caller error. Collective.
    pub fn initialize(&mut self) -> Result<(), StagGridError> {
        if self.state.is_some() {
            return Err(StagGridError::AlreadyInitialized);
        }
        if self.level.ghost_width() < 1 {
            return Err(StagGridError::GhostWidthMismatch {
                expected: 1,
                found: self.level.ghost_width(),
            });
        }
        let rank = self.comm.rank();
        let mut dof: LevelData<D, DofEntry> =
            LevelData::allocate(&self.level, rank, self.level.ghost_width());
        let partition = assign_level_dofs(&self.level, &mut dof, &self.comm)?;
        let data_synch = build_data_synch_schedule(&self.level);
        let ghost_fill = build_ghost_fill_schedule(&self.level);
        resolve_duplicate_dofs(&self.level, &mut dof, &data_synch, &ghost_fill, &self.comm)?;

        let x = self.backend.create_vector(&partition)?;
        let b = self.backend.create_vector(&partition)?;
        let matrix = assemble_matrix(
            &self.backend,
            &self.level,
            rank,
            &dof,
            &self.stencil,
            &partition,
        )?;
        debug!(
            "level solver initialized: {} dofs, {} synch ops, {} ghost ops",
            partition.total(),
            data_synch.ops().len(),
            ghost_fill.ops().len()
        );
        self.state = Some(SolverState {
            dof,
            partition,
            matrix,
            x,
            b,
            data_synch,
            ghost_fill,
        });
        Ok(())
    }

    /// Solve the operator for `x_field` given `b_field`.
    ///
    /// Copies the right-hand side in (boundary-adjusted on a private copy),
    /// invokes the backend, and, when the resulting iterate is defined,
    /// copies the solution out and synchronizes it. On `Breakdown` the prior
    /// contents of `x_field` are left untouched.
    ///
    /// # Errors
    /// `NotInitialized` when called before [`initialize`](Self::initialize),
    /// never a silent zero result. Collective.
    pub fn solve(
        &mut self,
        x_field: &mut LevelData<D, f64>,
        b_field: &LevelData<D, f64>,
    ) -> Result<SolveStatus, StagGridError> {
        let state = self.state.as_mut().ok_or(StagGridError::NotInitialized)?;
        let rank = self.comm.rank();

        if self.options.initial_guess_nonzero {
            copy_to_vec(
                &self.backend,
                &self.level,
                rank,
                x_field,
                &state.dof,
                &mut state.x,
            )?;
        }
        setup_rhs(
            &self.backend,
            &self.level,
            rank,
            b_field,
            &state.dof,
            &self.stencil,
            self.options.homogeneous_bc,
            &mut state.b,
        )?;

        let status = self
            .backend
            .solve(&state.matrix, &mut state.x, &state.b, &self.options)?;
        debug!("level solve finished: {status:?}");

        if status.is_defined() {
            copy_from_vec(
                &self.backend,
                &state.x,
                &self.level,
                x_field,
                &state.dof,
                &state.data_synch,
                &state.ghost_fill,
                &self.comm,
            )?;
        }
        Ok(status)
    }

    /// Release the DOF index field, vectors, matrix, and schedules.
    ///
    /// # Errors
    /// `NotInitialized` when there is no state to release.
    pub fn deallocate(&mut self) -> Result<(), StagGridError> {
        if self.state.take().is_none() {
            return Err(StagGridError::NotInitialized);
        }
        debug!("level solver deallocated");
        Ok(())
    }
}

impl<const D: usize, B, S, C> Drop for LevelSolver<D, B, S, C>
where
    B: LinearBackend,
    S: StencilProvider<D>,
    C: Communicator,
{
    fn drop(&mut self) {
        if self.state.is_some() {
            let _ = self.deallocate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::backend::SerialBackend;
    use crate::assembly::stencil::PoissonStencil;
    use crate::comm::NoComm;
    use crate::geometry::region::Region;

    fn solver()
    -> LevelSolver<2, SerialBackend, PoissonStencil<2>, NoComm> {
        let level = PatchLevel::new(
            Region::new([0, 0], [3, 3]),
            1,
            vec![(Region::new([0, 0], [3, 3]), 0)],
        )
        .unwrap();
        LevelSolver::new(
            level,
            SerialBackend,
            PoissonStencil::identity(),
            NoComm,
            SolverOptions::default(),
        )
    }

    #[test]
    fn solve_before_initialize_is_rejected() {
        let mut s = solver();
        let mut x = LevelData::allocate(s.level(), 0, 1);
        let b = LevelData::allocate(s.level(), 0, 1);
        assert_eq!(s.solve(&mut x, &b).unwrap_err(), StagGridError::NotInitialized);
    }

    #[test]
    fn double_initialize_is_rejected() {
        let mut s = solver();
        s.initialize().unwrap();
        assert_eq!(s.initialize().unwrap_err(), StagGridError::AlreadyInitialized);
    }

    #[test]
    fn deallocate_returns_to_uninitialized() {
        let mut s = solver();
        s.initialize().unwrap();
        assert!(s.is_initialized());
        s.deallocate().unwrap();
        assert!(!s.is_initialized());
        assert_eq!(s.deallocate().unwrap_err(), StagGridError::NotInitialized);
        // Re-initialization after deallocation is legal.
        s.initialize().unwrap();
        assert!(s.is_initialized());
    }

    #[test]
    fn zero_ghost_width_is_rejected() {
        let level = PatchLevel::new(
            Region::new([0, 0], [3, 3]),
            0,
            vec![(Region::new([0, 0], [3, 3]), 0)],
        )
        .unwrap();
        let mut s = LevelSolver::new(
            level,
            SerialBackend,
            PoissonStencil::<2>::identity(),
            NoComm,
            SolverOptions::default(),
        );
        assert!(matches!(
            s.initialize().unwrap_err(),
            StagGridError::GhostWidthMismatch {
                expected: 1,
                found: 0
            }
        ));
    }
}
