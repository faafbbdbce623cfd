use crate::protocol::{Oid, Value};
use bytes::Bytes;
use common::MIB_STRING_MAX_LEN;
use core::fmt;
use metrics::{Snapshot, SnapshotSubscriber};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{trace, warn};

/// `1.3.6.1.4.1.99999.1`, the private enterprise subtree the agent answers under.
const DEFAULT_BASE_ARCS: [u32; 8] = [1, 3, 6, 1, 4, 1, 99999, 1];

/// SNMP syntax of a registered scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Integer,
    OctetString,
}

/// The scalars exported by the agent, in OID order.
///
/// | Arc | Name                | Syntax      | Source                        |
/// | -   | ------------------- | ----------- | ----------------------------- |
/// | 1   | telemetryCpu        | INTEGER     | CPU load, percent             |
/// | 2   | telemetryMemUsedMb  | INTEGER     | used memory, MB               |
/// | 3   | telemetryMemTotalMb | INTEGER     | total memory, MB              |
/// | 4   | telemetryRxKbs      | INTEGER     | received, KB/s (MB/s × 1024)  |
/// | 5   | telemetryTxKbs      | INTEGER     | transmitted, KB/s             |
/// | 6   | telemetryDiskUsedPct| INTEGER     | primary disk usage, percent   |
/// | 7   | telemetryOsDescr    | OCTET STRING| OS description                |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarId {
    Cpu,
    MemoryUsed,
    MemoryTotal,
    RxRate,
    TxRate,
    DiskUsed,
    OsDescription,
}

impl ScalarId {
    pub const ALL: [ScalarId; 7] = [
        ScalarId::Cpu,
        ScalarId::MemoryUsed,
        ScalarId::MemoryTotal,
        ScalarId::RxRate,
        ScalarId::TxRate,
        ScalarId::DiskUsed,
        ScalarId::OsDescription,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ScalarId::Cpu => "telemetryCpu",
            ScalarId::MemoryUsed => "telemetryMemUsedMb",
            ScalarId::MemoryTotal => "telemetryMemTotalMb",
            ScalarId::RxRate => "telemetryRxKbs",
            ScalarId::TxRate => "telemetryTxKbs",
            ScalarId::DiskUsed => "telemetryDiskUsedPct",
            ScalarId::OsDescription => "telemetryOsDescr",
        }
    }

    /// Arc under the MIB base; the instance is always `.0`.
    pub fn arc(self) -> u32 {
        match self {
            ScalarId::Cpu => 1,
            ScalarId::MemoryUsed => 2,
            ScalarId::MemoryTotal => 3,
            ScalarId::RxRate => 4,
            ScalarId::TxRate => 5,
            ScalarId::DiskUsed => 6,
            ScalarId::OsDescription => 7,
        }
    }

    pub fn kind(self) -> ScalarKind {
        match self {
            ScalarId::OsDescription => ScalarKind::OctetString,
            _ => ScalarKind::Integer,
        }
    }

    fn initial_value(self) -> Value {
        match self.kind() {
            ScalarKind::Integer => Value::Integer(0),
            ScalarKind::OctetString => Value::OctetString(Bytes::new()),
        }
    }

    fn extract(self, snapshot: &Snapshot, string_max_len: usize) -> Value {
        let integer = |value: f64| Value::Integer(round_to_integer32(value));
        match self {
            ScalarId::Cpu => integer(snapshot.cpu_load_percent()),
            ScalarId::MemoryUsed => integer(snapshot.memory_used_mb()),
            ScalarId::MemoryTotal => integer(snapshot.memory_total_mb()),
            ScalarId::RxRate => integer(mbs_to_kbs(snapshot.network_rx_mbs())),
            ScalarId::TxRate => integer(mbs_to_kbs(snapshot.network_tx_mbs())),
            ScalarId::DiskUsed => integer(snapshot.disk_used_percent()),
            ScalarId::OsDescription => Value::OctetString(truncate_octets(
                snapshot.os_description(),
                string_max_len,
            )),
        }
    }
}

impl fmt::Display for ScalarId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Rounds half away from zero and saturates to the Integer32 range. Non-finite input reads 0.
pub fn round_to_integer32(value: f64) -> i64 {
    if !value.is_finite() {
        return 0;
    }
    value.round().clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i64
}

pub fn mbs_to_kbs(mbs: f64) -> f64 {
    mbs * 1024.0
}

/// Truncates `text` to at most `max_len` bytes without splitting a UTF-8 character.
pub fn truncate_octets(text: &str, max_len: usize) -> Bytes {
    if text.len() <= max_len {
        return Bytes::copy_from_slice(text.as_bytes());
    }
    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    Bytes::copy_from_slice(text[..end].as_bytes())
}

#[derive(Debug)]
struct MibValues {
    /// Cycle of the snapshot the values were taken from, 0 before the first update.
    generation: u64,
    /// Index-aligned with `MibRegistry::scalars`.
    values: Vec<Value>,
}

/// A reference-counted reference to a [`MibRegistry`].
pub type MibRegistryRef = Arc<MibRegistry>;

/// The fixed set of read-only scalars served over SNMP, together with their current values.
///
/// Values are replaced as a whole on every [`MibRegistry::update`], so one request sees the
/// values of a single snapshot.
pub struct MibRegistry {
    base: Oid,
    string_max_len: usize,
    /// Sorted by OID.
    scalars: Vec<(ScalarId, Oid)>,
    state: RwLock<MibValues>,
}

impl fmt::Debug for MibRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MibRegistry")
            .field("base", &self.base.to_string())
            .field("scalars", &self.scalars.len())
            .field("generation", &self.generation())
            .finish()
    }
}

impl Default for MibRegistry {
    fn default() -> Self {
        MibRegistry::new(Oid::from_arcs_unchecked(&DEFAULT_BASE_ARCS), MIB_STRING_MAX_LEN)
    }
}

impl MibRegistry {
    pub fn new(base: Oid, string_max_len: usize) -> Self {
        let mut scalars: Vec<_> = ScalarId::ALL
            .iter()
            .map(|id| (*id, base.child(id.arc()).child(0)))
            .collect();
        scalars.sort_by(|(_, a), (_, b)| a.cmp(b));

        let values = scalars.iter().map(|(id, _)| id.initial_value()).collect();
        trace!(base = %base, scalars = scalars.len(), "Registered MIB scalars");

        MibRegistry {
            base,
            string_max_len,
            scalars,
            state: RwLock::new(MibValues {
                generation: 0,
                values,
            }),
        }
    }

    pub fn base(&self) -> &Oid {
        &self.base
    }

    pub fn scalars(&self) -> impl Iterator<Item = (ScalarId, &Oid)> + '_ {
        self.scalars.iter().map(|(id, oid)| (*id, oid))
    }

    pub fn oid_of(&self, id: ScalarId) -> Option<&Oid> {
        self.scalars
            .iter()
            .find(|(scalar, _)| *scalar == id)
            .map(|(_, oid)| oid)
    }

    /// Every registered OID, in walk order.
    pub fn oids(&self) -> Vec<Oid> {
        self.scalars.iter().map(|(_, oid)| oid.clone()).collect()
    }

    /// Cycle of the snapshot currently served, 0 before the first update.
    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    /// Copies the current values, so a whole request is answered from one snapshot.
    pub fn view(&self) -> MibView<'_> {
        let state = self.state.read();
        MibView {
            scalars: &self.scalars,
            generation: state.generation,
            values: state.values.clone(),
        }
    }

    pub fn get(&self, oid: &Oid) -> Option<Value> {
        self.view().get(oid)
    }

    pub fn get_next(&self, oid: &Oid) -> Option<(Oid, Value)> {
        self.view().get_next(oid)
    }

    /// Whether `oid` names a registered object but not its `.0` instance.
    pub fn is_object(&self, oid: &Oid) -> bool {
        self.scalars.iter().any(|(_, registered)| {
            registered
                .parent()
                .map_or(false, |object| oid.starts_with(&object))
        })
    }

    /// Current values by scalar, in OID order.
    pub fn values(&self) -> Vec<(ScalarId, Value)> {
        let state = self.state.read();
        self.scalars
            .iter()
            .map(|(id, _)| *id)
            .zip(state.values.iter().cloned())
            .collect()
    }

    /// Replaces every value with one derived from `snapshot`. Snapshots older than the one
    /// already served are ignored.
    pub fn update(&self, snapshot: &Snapshot) {
        let values: Vec<_> = self
            .scalars
            .iter()
            .map(|(id, _)| id.extract(snapshot, self.string_max_len))
            .collect();

        let mut state = self.state.write();
        if snapshot.cycle() <= state.generation {
            warn!(
                cycle = snapshot.cycle(),
                generation = state.generation,
                "Ignoring stale snapshot"
            );
            return;
        }
        *state = MibValues {
            generation: snapshot.cycle(),
            values,
        };
        trace!(generation = snapshot.cycle(), "MIB values updated");
    }
}

/// Values of a single generation, detached from later updates.
#[derive(Debug, Clone)]
pub struct MibView<'a> {
    scalars: &'a [(ScalarId, Oid)],
    generation: u64,
    values: Vec<Value>,
}

impl MibView<'_> {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, oid: &Oid) -> Option<Value> {
        let index = self
            .scalars
            .binary_search_by(|(_, registered)| registered.cmp(oid))
            .ok()?;
        Some(self.values[index].clone())
    }

    /// The first registered OID strictly greater than `oid`, with its value.
    pub fn get_next(&self, oid: &Oid) -> Option<(Oid, Value)> {
        let index = self
            .scalars
            .partition_point(|(_, registered)| registered <= oid);
        let (_, next) = self.scalars.get(index)?;
        Some((next.clone(), self.values[index].clone()))
    }
}

impl SnapshotSubscriber for MibRegistry {
    fn name(&self) -> &str {
        "mib"
    }

    fn publish(&self, snapshot: &Snapshot) {
        self.update(snapshot);
    }
}
