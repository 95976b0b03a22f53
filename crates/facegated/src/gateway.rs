//! Trigger gateway — serializes verification requests.
//!
//! Manual and remote triggers converge here. The cycle stage lives in one
//! atomic; the only way into a cycle is winning the compare-exchange on the
//! Idle→Capturing edge, so at most one cycle is in flight at any time. A
//! losing trigger is rejected immediately, never queued or blocked.

use crate::engine::EngineHandle;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Stage of the verification cycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CycleStage {
    Idle = 0,
    Capturing = 1,
    Scoring = 2,
    Notifying = 3,
}

impl CycleStage {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => CycleStage::Capturing,
            2 => CycleStage::Scoring,
            3 => CycleStage::Notifying,
            _ => CycleStage::Idle,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CycleStage::Idle => "idle",
            CycleStage::Capturing => "capturing",
            CycleStage::Scoring => "scoring",
            CycleStage::Notifying => "notifying",
        }
    }
}

/// Atomic holder of the current cycle stage.
///
/// Errors anywhere in a cycle end with [`finish`](Self::finish); there is no
/// persistent failure state.
pub struct CycleState(AtomicU8);

impl CycleState {
    pub fn new() -> Self {
        Self(AtomicU8::new(CycleStage::Idle as u8))
    }

    /// Attempt the Idle→Capturing transition. Non-blocking; returns false
    /// when a cycle is already in flight.
    pub fn try_begin(&self) -> bool {
        self.0
            .compare_exchange(
                CycleStage::Idle as u8,
                CycleStage::Capturing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Record progress within an admitted cycle.
    pub fn advance(&self, stage: CycleStage) {
        self.0.store(stage as u8, Ordering::Release);
    }

    /// Return to Idle, ready for the next trigger.
    pub fn finish(&self) {
        self.0.store(CycleStage::Idle as u8, Ordering::Release);
    }

    pub fn current(&self) -> CycleStage {
        CycleStage::from_u8(self.0.load(Ordering::Acquire))
    }
}

impl Default for CycleState {
    fn default() -> Self {
        Self::new()
    }
}

/// Where a trigger came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOrigin {
    Manual,
    Remote,
}

impl TriggerOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerOrigin::Manual => "manual",
            TriggerOrigin::Remote => "remote",
        }
    }
}

/// Whether a trigger was admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Started,
    Busy,
}

/// Front door for verification triggers.
#[derive(Clone)]
pub struct TriggerGateway {
    state: Arc<CycleState>,
    engine: EngineHandle,
}

impl TriggerGateway {
    pub fn new(state: Arc<CycleState>, engine: EngineHandle) -> Self {
        Self { state, engine }
    }

    /// Request a verification cycle. Rejected without blocking when one is
    /// already in flight.
    pub fn trigger(&self, origin: TriggerOrigin) -> TriggerOutcome {
        if !self.state.try_begin() {
            tracing::info!(
                origin = origin.as_str(),
                stage = self.state.current().as_str(),
                "trigger rejected; verification already in flight"
            );
            return TriggerOutcome::Busy;
        }

        if let Err(e) = self.engine.submit(origin) {
            self.state.finish();
            tracing::error!(origin = origin.as_str(), error = %e, "engine unavailable; trigger dropped");
            return TriggerOutcome::Busy;
        }

        tracing::info!(origin = origin.as_str(), "verification cycle admitted");
        TriggerOutcome::Started
    }

    pub fn stage(&self) -> CycleStage {
        self.state.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_second_begin_rejected_while_busy() {
        let state = CycleState::new();
        assert!(state.try_begin());
        assert!(!state.try_begin());
        state.finish();
        assert!(state.try_begin());
    }

    #[test]
    fn test_stage_transitions() {
        let state = CycleState::new();
        assert_eq!(state.current(), CycleStage::Idle);
        assert!(state.try_begin());
        assert_eq!(state.current(), CycleStage::Capturing);
        state.advance(CycleStage::Scoring);
        assert_eq!(state.current(), CycleStage::Scoring);
        state.advance(CycleStage::Notifying);
        assert_eq!(state.current(), CycleStage::Notifying);
        state.finish();
        assert_eq!(state.current(), CycleStage::Idle);
    }

    #[test]
    fn test_concurrent_triggers_admit_exactly_one() {
        let state = Arc::new(CycleState::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let state = state.clone();
            handles.push(std::thread::spawn(move || state.try_begin()));
        }
        let admitted = handles
            .into_iter()
            .filter(|h| *h.join().unwrap())
            .count();
        assert_eq!(admitted, 1);
        assert_eq!(state.current(), CycleStage::Capturing);
    }

    #[test]
    fn test_gateway_rejects_while_cycle_in_flight() {
        let (tx, mut rx) = mpsc::channel(1);
        let state = Arc::new(CycleState::new());
        let gateway = TriggerGateway::new(state.clone(), EngineHandle { tx });

        assert_eq!(gateway.trigger(TriggerOrigin::Manual), TriggerOutcome::Started);
        // Still Capturing: the engine has not picked the request up yet
        assert_eq!(gateway.trigger(TriggerOrigin::Remote), TriggerOutcome::Busy);
        assert_eq!(gateway.stage(), CycleStage::Capturing);

        // Engine drains and completes the cycle
        assert!(rx.try_recv().is_ok());
        state.finish();
        assert_eq!(gateway.trigger(TriggerOrigin::Remote), TriggerOutcome::Started);
    }

    #[test]
    fn test_gateway_recovers_when_engine_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let state = Arc::new(CycleState::new());
        let gateway = TriggerGateway::new(state.clone(), EngineHandle { tx });

        assert_eq!(gateway.trigger(TriggerOrigin::Manual), TriggerOutcome::Busy);
        // Guard was released; the gateway is not wedged
        assert_eq!(state.current(), CycleStage::Idle);
    }
}
