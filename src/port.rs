//! The port manager and execution-progression firing rules (§4.5).

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::id::Id;
use crate::object::ObjectName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    Input,
    Output,
}

/// Scheduling policy governing how `ComputeObject` is delivered across
/// a module's MPI ranks (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulingPolicy {
    /// Sent only to the owning rank.
    Single,
    /// Broadcast to every rank of the module, with a per-object barrier.
    Gang,
    /// Broadcast to every rank, without a per-object barrier.
    LazyGang,
    /// Never fires.
    Ignore,
}

/// When `Reduce` is broadcast to a module (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReducePolicy {
    Never,
    Locally,
    PerTimestep,
    PerTimestepOrdered,
    PerTimestepZeroFirst,
    OverAll,
}

/// How a module wants `AddObject` payloads delivered across ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectReceivePolicy {
    Local,
    Master,
    Distribute,
}

/// Whether a port requires every other connected input to have
/// arrived before it participates in synchronization (§4.5: "combining"
/// ports need no cross-port sync).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortFlag {
    Combine,
    Default,
}

#[derive(Debug, Clone)]
pub struct Port {
    pub name: String,
    pub direction: PortDirection,
    pub flag: PortFlag,
}

impl Port {
    pub fn input(name: impl Into<String>) -> Self {
        Self { name: name.into(), direction: PortDirection::Input, flag: PortFlag::Default }
    }

    pub fn output(name: impl Into<String>) -> Self {
        Self { name: name.into(), direction: PortDirection::Output, flag: PortFlag::Default }
    }

    pub fn combining(mut self) -> Self {
        self.flag = PortFlag::Combine;
        self
    }

    pub fn is_combining(&self) -> bool {
        matches!(self.flag, PortFlag::Combine)
    }
}

/// Per-input-port arrival bookkeeping (§4.5).
#[derive(Debug, Default)]
struct InputState {
    queue: VecDeque<ObjectName>,
    pending_resets: u32,
    pending_finishes: u32,
    /// Whether an upstream output is currently wired to this input. An
    /// unconnected input never receives a `Start`/`Finish`, so it must
    /// not be counted in the firing rules below.
    connected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub module: Id,
    pub port: &'static str,
}

/// Outcome of feeding one event into the port manager: which firing
/// rules of §4.5 are now satisfied for the owning module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FiringDecision {
    pub prepare: bool,
    pub compute: bool,
    pub reduce: bool,
}

/// Tracks one module's ports, their non-combining connectivity, and the
/// arrival counters that drive Prepare/ComputeObject/Reduce firing.
pub struct PortManager {
    ports: HashMap<String, Port>,
    inputs: HashMap<String, InputState>,
    /// `(from_module, from_port) -> [(to_module, to_port)]`, used by the
    /// cluster manager to expand an `AddObject` into per-destination
    /// deliveries (§4.4 step 1).
    connections: HashMap<(Id, String), Vec<(Id, String)>>,
}

impl PortManager {
    pub fn new() -> Self {
        Self {
            ports: HashMap::new(),
            inputs: HashMap::new(),
            connections: HashMap::new(),
        }
    }

    pub fn add_port(&mut self, port: Port) {
        if matches!(port.direction, PortDirection::Input) {
            self.inputs.insert(port.name.clone(), InputState::default());
        }
        self.ports.insert(port.name.clone(), port);
    }

    pub fn remove_port(&mut self, name: &str) {
        self.ports.remove(name);
        self.inputs.remove(name);
    }

    pub fn connect(&mut self, from: (Id, String), to: (Id, String)) {
        self.connections.entry(from).or_default().push(to);
    }

    pub fn disconnect(&mut self, from: &(Id, String), to: &(Id, String)) {
        if let Some(dests) = self.connections.get_mut(from) {
            dests.retain(|d| d != to);
        }
    }

    /// Mark a local input port as having an upstream connection. Called
    /// when the cluster manager wires a `Connect` between two ports
    /// (§4.5: only a *connected* non-combining input participates in
    /// the Prepare/Reduce sync, mirroring the teacher's `Port::optional`).
    pub fn connect_input(&mut self, port: &str) {
        if let Some(state) = self.inputs.get_mut(port) {
            state.connected = true;
        }
    }

    /// Reverse of [`connect_input`]; called on `Disconnect` once no
    /// upstream remains wired to this input.
    pub fn disconnect_input(&mut self, port: &str) {
        if let Some(state) = self.inputs.get_mut(port) {
            state.connected = false;
        }
    }

    /// Destinations an `AddObject` from `(module, port)` must be
    /// expanded into (§4.4 step 1).
    pub fn connections_from(&self, module: Id, port: &str) -> &[(Id, String)] {
        self.connections
            .get(&(module, port.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every non-combining input that currently has an upstream
    /// connection (§4.5: "every non-combining connected input").
    fn connected_non_combining_inputs(&self) -> impl Iterator<Item = &str> {
        self.ports.values().filter_map(|p| {
            let is_sync_input = matches!(p.direction, PortDirection::Input) && !p.is_combining();
            let connected = self.inputs.get(&p.name).map(|s| s.connected).unwrap_or(false);
            (is_sync_input && connected).then_some(p.name.as_str())
        })
    }

    /// An object arrived on `port`'s FIFO.
    pub fn object_arrived(&mut self, port: &str, object: ObjectName, scheduling: SchedulingPolicy) -> bool {
        if let Some(state) = self.inputs.get_mut(port) {
            state.queue.push_back(object);
        }
        !matches!(scheduling, SchedulingPolicy::Ignore)
    }

    pub fn pop_object(&mut self, port: &str) -> Option<ObjectName> {
        self.inputs.get_mut(port)?.queue.pop_front()
    }

    /// Upstream signalled a new execution start on `port`.
    pub fn reset_arrived(&mut self, port: &str) {
        if let Some(state) = self.inputs.get_mut(port) {
            state.pending_resets += 1;
        }
    }

    /// Upstream signalled completion on `port`.
    pub fn finish_arrived(&mut self, port: &str) {
        if let Some(state) = self.inputs.get_mut(port) {
            state.pending_finishes += 1;
        }
    }

    /// Every non-combining connected input has at least one pending
    /// reset (§4.5 "Prepare fires"). Pops one reset from each on success.
    pub fn prepare_ready(&mut self) -> bool {
        let names: Vec<String> = self.connected_non_combining_inputs().map(str::to_string).collect();
        if names.is_empty() {
            return false;
        }
        let all_pending = names.iter().all(|n| {
            self.inputs.get(n).map(|s| s.pending_resets > 0).unwrap_or(false)
        });
        if all_pending {
            for n in &names {
                if let Some(s) = self.inputs.get_mut(n) {
                    s.pending_resets -= 1;
                }
            }
        }
        all_pending
    }

    /// Every non-combining connected input has a pending finish, and
    /// the module's reduce policy allows a reduce (§4.5 "Reduce fires").
    pub fn reduce_ready(&mut self, reduce_policy: ReducePolicy) -> bool {
        if matches!(reduce_policy, ReducePolicy::Never | ReducePolicy::Locally) {
            return false;
        }
        let names: Vec<String> = self.connected_non_combining_inputs().map(str::to_string).collect();
        if names.is_empty() {
            return false;
        }
        let all_pending = names.iter().all(|n| {
            self.inputs.get(n).map(|s| s.pending_finishes > 0).unwrap_or(false)
        });
        if all_pending {
            for n in &names {
                if let Some(s) = self.inputs.get_mut(n) {
                    s.pending_finishes -= 1;
                }
            }
        }
        all_pending
    }
}

impl Default for PortManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_fires_only_once_every_non_combining_input_has_a_reset() {
        let mut pm = PortManager::new();
        pm.add_port(Port::input("data_in"));
        pm.add_port(Port::input("grid_in"));
        pm.connect_input("data_in");
        pm.connect_input("grid_in");
        assert!(!pm.prepare_ready());

        pm.reset_arrived("data_in");
        assert!(!pm.prepare_ready());

        pm.reset_arrived("grid_in");
        assert!(pm.prepare_ready());
        // consumed; firing again needs fresh resets
        assert!(!pm.prepare_ready());
    }

    #[test]
    fn combining_ports_are_excluded_from_the_sync_requirement() {
        let mut pm = PortManager::new();
        pm.add_port(Port::input("data_in"));
        pm.add_port(Port::input("params_in").combining());
        pm.connect_input("data_in");
        pm.connect_input("params_in");

        pm.reset_arrived("data_in");
        assert!(pm.prepare_ready());
    }

    #[test]
    fn unconnected_non_combining_inputs_never_block_prepare() {
        let mut pm = PortManager::new();
        pm.add_port(Port::input("data_in"));
        pm.add_port(Port::input("optional_in"));
        pm.connect_input("data_in");
        // optional_in has no upstream wired at all.

        pm.reset_arrived("data_in");
        assert!(pm.prepare_ready());
    }

    #[test]
    fn reduce_never_fires_under_never_or_locally_policy() {
        let mut pm = PortManager::new();
        pm.add_port(Port::input("data_in"));
        pm.connect_input("data_in");
        pm.finish_arrived("data_in");
        assert!(!pm.reduce_ready(ReducePolicy::Never));
        assert!(!pm.reduce_ready(ReducePolicy::Locally));
        assert!(pm.reduce_ready(ReducePolicy::PerTimestep));
    }

    #[test]
    fn reduce_ignores_an_unconnected_non_combining_input() {
        let mut pm = PortManager::new();
        pm.add_port(Port::input("data_in"));
        pm.add_port(Port::input("optional_in"));
        pm.connect_input("data_in");
        pm.finish_arrived("data_in");
        assert!(pm.reduce_ready(ReducePolicy::PerTimestep));
    }

    #[test]
    fn connections_expand_to_every_destination() {
        let mut pm = PortManager::new();
        pm.connect((1, "out".into()), (2, "in".into()));
        pm.connect((1, "out".into()), (3, "in".into()));
        let dests = pm.connections_from(1, "out");
        assert_eq!(dests.len(), 2);
    }
}
