use hashbrown::HashSet;

use crate::{
    points::PointCloud,
    types::{PointId, Vertex},
    void_polygon::VoidPolygon,
};

/// Defines debug recording of the sampling phases
#[derive(Debug, Clone)]
pub enum PhaseRecord {
    /// Records all the phases
    All,
    /// Records the steps during the specified phase
    In(Phase),
    /// Records the steps during the specified phases
    InAny(HashSet<Phase>),
}

/// Defines debug recording of the sampling steps
#[derive(Debug, Clone)]
pub enum StepsRecord {
    /// Records all the steps
    All,
    /// Records all the steps after the specified one (inclusive)
    From(usize),
    /// Records all the steps until the specified one (inclusive)
    Until(usize),
    /// Records all the steps between the specified ones (inclusive)
    Between(usize, usize),
}

#[derive(Debug, Clone)]
pub struct DebugConfiguration {
    pub phase_record: PhaseRecord,
    pub steps_record: StepsRecord,
    /// [None] means that it won't force an early exit
    pub force_end_at_step: Option<usize>,
}
impl Default for DebugConfiguration {
    fn default() -> Self {
        Self {
            phase_record: PhaseRecord::All,
            steps_record: StepsRecord::All,
            force_end_at_step: Default::default(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Phase {
    BoundarySprinkling,
    RandomFill,
    VoidElimination,
    LocalTriangulation,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EventInfo {
    /// End of a phase
    Completed,
    /// A sample was accepted
    Sampled(PointId),
    /// Void regions were rebuilt for a new Mode II pass
    VoidPass(usize),
    /// The neighbor ring of a point was finalized
    RingBuilt(PointId),
}

#[derive(Debug, Clone)]
pub struct DebugSnapshot {
    pub step: usize,
    pub phase: Phase,
    pub event: EventInfo,
    /// Positions of all the points sampled so far
    pub points: Vec<Vertex>,
    pub changed_ids: Vec<PointId>,
    /// Void regions alive at this step, only recorded during [Phase::VoidElimination]
    pub voids: Vec<VoidPolygon>,
}

#[derive(Debug, Clone)]
pub struct DebugContext {
    pub config: DebugConfiguration,
    pub snapshots: Vec<DebugSnapshot>,
    pub current_step: usize,
}

impl DebugContext {
    pub(crate) fn new(config: DebugConfiguration) -> Self {
        Self {
            config,
            snapshots: Vec::new(),
            current_step: 0,
        }
    }

    fn records(&self, phase: Phase) -> bool {
        let phase_recorded = match &self.config.phase_record {
            PhaseRecord::All => true,
            PhaseRecord::InAny(phases) => phases.contains(&phase),
            PhaseRecord::In(rec_phase) => phase == *rec_phase,
        };
        phase_recorded
            && match self.config.steps_record {
                StepsRecord::All => true,
                StepsRecord::From(from) => self.current_step >= from,
                StepsRecord::Until(to) => self.current_step <= to,
                StepsRecord::Between(from, to) => {
                    self.current_step >= from && self.current_step <= to
                }
            }
    }

    pub(crate) fn push_snapshot(
        &mut self,
        phase: Phase,
        cloud: &PointCloud,
        changed_ids: &[PointId],
    ) {
        self.push_snapshot_event(phase, EventInfo::Completed, cloud, changed_ids, &[]);
    }

    pub(crate) fn push_snapshot_event(
        &mut self,
        phase: Phase,
        event: EventInfo,
        cloud: &PointCloud,
        changed_ids: &[PointId],
        voids: &[VoidPolygon],
    ) {
        if !self.records(phase) {
            return;
        }
        self.snapshots.push(DebugSnapshot {
            step: self.current_step,
            phase,
            event,
            points: cloud.points.iter().map(|p| p.position).collect(),
            changed_ids: changed_ids.to_vec(),
            voids: voids.to_vec(),
        });
    }

    /// Returns true if the algorithm should stop
    pub(crate) fn advance_step(&mut self) -> bool {
        self.current_step += 1;
        match self.config.force_end_at_step {
            Some(end_step) => self.current_step >= end_step,
            None => false,
        }
    }
}
