//! Resource model — node capacity and the arithmetic between total,
//! reserved, and consumed capacity.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// Four scalar capacities. Signed so that an over-committed node shows up
/// as a negative residual instead of wrapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resources {
    #[serde(default)]
    pub cpu: i64,
    #[serde(default)]
    pub memory_mb: i64,
    #[serde(default)]
    pub disk_mb: i64,
    #[serde(default)]
    pub iops: i64,
}

/// A single resource dimension, used to report what ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Cpu,
    Memory,
    Disk,
    Iops,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::Disk => "disk",
            Self::Iops => "iops",
        };
        f.write_str(name)
    }
}

impl Resources {
    pub const fn new(cpu: i64, memory_mb: i64, disk_mb: i64, iops: i64) -> Self {
        Self {
            cpu,
            memory_mb,
            disk_mb,
            iops,
        }
    }

    /// Check whether `self` can hold `other`. Returns the first exhausted
    /// dimension on failure.
    pub fn superset(&self, other: &Resources) -> Result<(), Dimension> {
        if self.cpu < other.cpu {
            return Err(Dimension::Cpu);
        }
        if self.memory_mb < other.memory_mb {
            return Err(Dimension::Memory);
        }
        if self.disk_mb < other.disk_mb {
            return Err(Dimension::Disk);
        }
        if self.iops < other.iops {
            return Err(Dimension::Iops);
        }
        Ok(())
    }

    pub fn is_non_negative(&self) -> bool {
        self.cpu >= 0 && self.memory_mb >= 0 && self.disk_mb >= 0 && self.iops >= 0
    }

    /// Capacity left on a node: `total - reserved - Σ consumed`.
    pub fn residual<'a, I>(total: &Resources, reserved: &Resources, consumed: I) -> Resources
    where
        I: IntoIterator<Item = &'a Resources>,
    {
        consumed
            .into_iter()
            .fold(*total - *reserved, |acc, used| acc - *used)
    }
}

impl Add for Resources {
    type Output = Resources;

    fn add(self, rhs: Resources) -> Resources {
        Resources {
            cpu: self.cpu + rhs.cpu,
            memory_mb: self.memory_mb + rhs.memory_mb,
            disk_mb: self.disk_mb + rhs.disk_mb,
            iops: self.iops + rhs.iops,
        }
    }
}

impl AddAssign for Resources {
    fn add_assign(&mut self, rhs: Resources) {
        *self = *self + rhs;
    }
}

impl Sub for Resources {
    type Output = Resources;

    fn sub(self, rhs: Resources) -> Resources {
        Resources {
            cpu: self.cpu - rhs.cpu,
            memory_mb: self.memory_mb - rhs.memory_mb,
            disk_mb: self.disk_mb - rhs.disk_mb,
            iops: self.iops - rhs.iops,
        }
    }
}

impl SubAssign for Resources {
    fn sub_assign(&mut self, rhs: Resources) {
        *self = *self - rhs;
    }
}

impl Sum for Resources {
    fn sum<I: Iterator<Item = Resources>>(iter: I) -> Self {
        iter.fold(Resources::default(), Add::add)
    }
}

impl<'a> Sum<&'a Resources> for Resources {
    fn sum<I: Iterator<Item = &'a Resources>>(iter: I) -> Self {
        iter.copied().sum()
    }
}
