//! # Cache geometry probe
//!
//! Walks the x86 deterministic cache parameters leaf (`0x4`, or the AMD
//! equivalent `0x8000_001D`) and reports the first data or unified cache it
//! finds, which on every known part is the L1d. The hardware query sits
//! behind [`CpuidSource`] so the decoding and walk can be driven by synthetic
//! register values in tests.
//!
//! Probing never fails from the caller's point of view: when nothing usable
//! comes back, [`detect`] hands out [`CacheGeometry::FALLBACK`] and flags it.
use crate::error::BenchError;
use log::{debug, warn};

/// Standard deterministic cache parameters leaf
pub const CACHE_PARAMS_LEAF: u32 = 0x4;
/// AMD extended leaf with the same register layout as leaf 0x4
pub const AMD_CACHE_PARAMS_LEAF: u32 = 0x8000_001D;
/// Base of the extended CPUID range, queried for the highest extended leaf
pub const EXTENDED_LEAF_BASE: u32 = 0x8000_0000;
/// Upper bound on subleaves walked before giving up
pub const MAX_SUBLEAVES: u32 = 10;

// EAX
const CACHE_TYPE_MASK: u32 = 0x1F;
const CACHE_LEVEL_SHIFT: u32 = 5;
const CACHE_LEVEL_MASK: u32 = 0x7;
// EBX, all fields zero-based
const WAYS_SHIFT: u32 = 22;
const WAYS_MASK: u32 = 0x3FF;
const PARTITIONS_SHIFT: u32 = 12;
const PARTITIONS_MASK: u32 = 0x3FF;
const LINE_SIZE_MASK: u32 = 0xFFF;
// ECX holds (sets - 1) as a plain count

/// Raw output of a single CPUID invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuidRegisters {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
}

/// Something that can answer CPUID queries
pub trait CpuidSource {
    /// Highest leaf supported in the range starting at `base` (`0x0` or
    /// `0x8000_0000`), or `None` when the range (or CPUID itself) is unavailable
    fn max_leaf(&self, base: u32) -> Option<u32>;

    /// Execute CPUID for `leaf`/`subleaf`
    fn query(&self, leaf: u32, subleaf: u32) -> CpuidRegisters;
}

/// The CPU the process is running on
#[derive(Debug, Clone, Copy, Default)]
pub struct HardwareCpuid;

#[cfg(target_arch = "x86_64")]
impl CpuidSource for HardwareCpuid {
    fn max_leaf(&self, base: u32) -> Option<u32> {
        // SAFETY: CPUID is architecturally guaranteed on x86_64
        let regs = unsafe { core::arch::x86_64::__cpuid(base) };
        if base >= EXTENDED_LEAF_BASE && regs.eax < base {
            None
        } else {
            Some(regs.eax)
        }
    }

    fn query(&self, leaf: u32, subleaf: u32) -> CpuidRegisters {
        // SAFETY: as above; callers stay within the advertised leaf range
        let r = unsafe { core::arch::x86_64::__cpuid_count(leaf, subleaf) };
        CpuidRegisters {
            eax: r.eax,
            ebx: r.ebx,
            ecx: r.ecx,
            edx: r.edx,
        }
    }
}

#[cfg(not(target_arch = "x86_64"))]
impl CpuidSource for HardwareCpuid {
    fn max_leaf(&self, _base: u32) -> Option<u32> {
        None
    }

    fn query(&self, _leaf: u32, _subleaf: u32) -> CpuidRegisters {
        CpuidRegisters::default()
    }
}

/// Cache type field of a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheType {
    Data,
    Instruction,
    Unified,
    Reserved(u32),
}

impl CacheType {
    /// `None` for the null (terminating) descriptor
    fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => None,
            1 => Some(CacheType::Data),
            2 => Some(CacheType::Instruction),
            3 => Some(CacheType::Unified),
            other => Some(CacheType::Reserved(other)),
        }
    }

    /// Whether this cache holds data (data or unified)
    pub fn holds_data(self) -> bool {
        matches!(self, CacheType::Data | CacheType::Unified)
    }
}

/// One decoded cache descriptor, counts already converted from zero-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheDescriptor {
    pub cache_type: CacheType,
    pub level: u32,
    pub ways: u32,
    pub partitions: u32,
    pub line_size: u32,
    pub sets: u32,
}

impl CacheDescriptor {
    /// Total capacity in bytes
    pub fn size_bytes(&self) -> u64 {
        u64::from(self.ways)
            * u64::from(self.partitions)
            * u64::from(self.line_size)
            * u64::from(self.sets)
    }

    /// `None` if any field is zero or the size doesn't fit in `usize`
    pub fn geometry(&self) -> Option<CacheGeometry> {
        CacheGeometry::new(
            usize::try_from(self.size_bytes()).ok()?,
            usize::try_from(self.ways).ok()?,
            usize::try_from(self.line_size).ok()?,
        )
    }
}

/// Decode the registers of one cache parameters subleaf. Returns `None` for
/// the null descriptor that ends the walk.
pub fn decode_descriptor(regs: CpuidRegisters) -> Option<CacheDescriptor> {
    let cache_type = CacheType::from_raw(regs.eax & CACHE_TYPE_MASK)?;
    Some(CacheDescriptor {
        cache_type,
        level: (regs.eax >> CACHE_LEVEL_SHIFT) & CACHE_LEVEL_MASK,
        ways: ((regs.ebx >> WAYS_SHIFT) & WAYS_MASK) + 1,
        partitions: ((regs.ebx >> PARTITIONS_SHIFT) & PARTITIONS_MASK) + 1,
        line_size: (regs.ebx & LINE_SIZE_MASK) + 1,
        sets: regs.ecx.wrapping_add(1),
    })
}

/// L1 data cache geometry. All fields are non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheGeometry {
    l1_size_bytes: usize,
    associativity: usize,
    line_size_bytes: usize,
}

impl CacheGeometry {
    /// Substituted when detection fails: 32 KiB, 8-way, 64 B lines
    pub const FALLBACK: CacheGeometry = CacheGeometry {
        l1_size_bytes: 32 * 1024,
        associativity: 8,
        line_size_bytes: 64,
    };

    /// Build a geometry, rejecting zero fields
    pub fn new(l1_size_bytes: usize, associativity: usize, line_size_bytes: usize) -> Option<Self> {
        if l1_size_bytes == 0 || associativity == 0 || line_size_bytes == 0 {
            return None;
        }
        Some(CacheGeometry {
            l1_size_bytes,
            associativity,
            line_size_bytes,
        })
    }

    pub fn l1_size_bytes(&self) -> usize {
        self.l1_size_bytes
    }

    pub fn associativity(&self) -> usize {
        self.associativity
    }

    pub fn line_size_bytes(&self) -> usize {
        self.line_size_bytes
    }
}

/// Walk one cache parameters leaf and return the first data/unified cache
fn walk_leaf(source: &impl CpuidSource, leaf: u32) -> Result<CacheGeometry, BenchError> {
    for subleaf in 0..MAX_SUBLEAVES {
        let Some(desc) = decode_descriptor(source.query(leaf, subleaf)) else {
            break;
        };
        debug!("leaf {leaf:#x}.{subleaf}: {desc:?}");
        if desc.cache_type.holds_data() {
            if let Some(geometry) = desc.geometry() {
                return Ok(geometry);
            }
        }
    }
    Err(BenchError::NoCacheDescriptor {
        bound: MAX_SUBLEAVES,
    })
}

/// Query L1d geometry, reporting why detection failed
pub fn probe(source: &impl CpuidSource) -> Result<CacheGeometry, BenchError> {
    let max_basic = source
        .max_leaf(0)
        .ok_or(BenchError::HardwareQueryUnsupported)?;

    let mut last_err = BenchError::HardwareQueryUnsupported;
    if max_basic >= CACHE_PARAMS_LEAF {
        match walk_leaf(source, CACHE_PARAMS_LEAF) {
            Ok(geometry) => return Ok(geometry),
            Err(e) => {
                debug!("leaf {CACHE_PARAMS_LEAF:#x} unusable: {e}");
                last_err = e;
            }
        }
    }

    match source.max_leaf(EXTENDED_LEAF_BASE) {
        Some(max_ext) if max_ext >= AMD_CACHE_PARAMS_LEAF => {
            walk_leaf(source, AMD_CACHE_PARAMS_LEAF)
        }
        _ => Err(last_err),
    }
}

/// Detect L1d geometry. The flag is `false` when [`CacheGeometry::FALLBACK`]
/// was substituted.
pub fn detect(source: &impl CpuidSource) -> (CacheGeometry, bool) {
    match probe(source) {
        Ok(geometry) => (geometry, true),
        Err(e) => {
            warn!("{e}; falling back to 32 KiB / 8-way / 64 B L1d geometry");
            (CacheGeometry::FALLBACK, false)
        }
    }
}
