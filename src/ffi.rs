//! C ABI entry points
//!
//! Each backend owns one lazily built [`Engine`] behind a mutex, so calls
//! for the same backend are serialized. A failed GPU acquisition leaves the
//! slot empty and is attempted again on the next call.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;

use nbody_simulation::{
    validate_time_step, Backend, Engine, EngineConfig, Particle, ParticleBuffer, SimulationError,
    Status,
};

/// Caller-owned particle array as seen from C.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SimulationData {
    pub particle_data: *mut Particle,
    pub nbodies: i32,
}

static PARALLEL_ENGINE: Mutex<Option<Engine>> = Mutex::new(None);
static SEQUENTIAL_ENGINE: Mutex<Option<Engine>> = Mutex::new(None);

/// Advance `data` by `time_step` on the GPU.
///
/// Returns 0 on success, 1 for invalid arguments and 2 when the device is
/// unavailable or the step fails. The particles are untouched unless 0 is
/// returned.
///
/// # Safety
///
/// `data` must be null or point to a valid `SimulationData` whose
/// `particle_data` references `nbodies` writable particles not aliased
/// elsewhere for the duration of the call.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "C" fn updateSimulationCuda(data: *mut SimulationData, time_step: f32) -> i32 {
    run(&PARALLEL_ENGINE, Backend::Parallel, data, time_step).code()
}

/// Advance `data` by `time_step` on the calling thread.
///
/// # Safety
///
/// Same contract as [`updateSimulationCuda`].
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "C" fn updateSimulationC(data: *mut SimulationData, time_step: f32) -> i32 {
    run(&SEQUENTIAL_ENGINE, Backend::Sequential, data, time_step).code()
}

unsafe fn run(
    slot: &Mutex<Option<Engine>>,
    backend: Backend,
    data: *mut SimulationData,
    time_step: f32,
) -> Status {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        // SAFETY: the caller guarantees `data` is null or valid for the call
        let data = unsafe { data.as_ref() }
            .ok_or_else(|| SimulationError::invalid("simulation data is null"))?;
        // SAFETY: as above for the particle array it describes
        let buffer = unsafe { ParticleBuffer::from_raw_parts(data.particle_data, data.nbodies) }?;
        validate_time_step(time_step)?;
        if buffer.is_empty() {
            return Ok(());
        }

        let mut guard = slot.lock().unwrap_or_else(|poisoned| {
            log::warn!("{backend} engine panicked during an earlier step; rebuilding it");
            let mut guard = poisoned.into_inner();
            *guard = None;
            guard
        });
        if guard.is_none() {
            *guard = Some(Engine::new(EngineConfig::new(backend))?);
        }
        let engine = guard
            .as_mut()
            .ok_or_else(|| SimulationError::Execution("engine slot is empty".into()))?;
        engine.update(buffer, time_step)
    }));

    match outcome {
        Ok(Ok(())) => Status::Success,
        Ok(Err(e)) => {
            log::warn!("{backend} step failed: {e}");
            e.status()
        }
        Err(_) => {
            log::error!("{backend} step panicked");
            Status::ExecutionFailure
        }
    }
}
