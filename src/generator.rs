use crate::config::{KEY_WIDTH, SizeDistribution};
use crate::error::BenchError;
use rand::SeedableRng;
use rand::distr::{Distribution, Uniform};
use rand::rngs::SmallRng;
use rand_distr::Zipf;

pub const KEY_LEN: usize = KEY_WIDTH as usize;

/// Byte every value is filled with.
pub const FILLER: u8 = b'a';

enum SizeDist {
    Uniform(Uniform<u64>),
    Zipf(Zipf<f64>),
}

/// Draws entry sizes in `[min, max]`.
pub struct SizeGen {
    dist: SizeDist,
    min: u64,
    rng: SmallRng,
}

impl SizeGen {
    pub fn new(min: u64, max: u64, kind: SizeDistribution, seed: u64) -> Result<Self, BenchError> {
        let span = max
            .checked_sub(min)
            .ok_or_else(|| BenchError::config(format!("empty entry size range {min}..={max}")))?;

        let dist = match kind {
            SizeDistribution::Uniform => Uniform::new_inclusive(min, max)
                .map(SizeDist::Uniform)
                .map_err(|e| BenchError::config(format!("entry size range {min}..={max}: {e}")))?,
            SizeDistribution::Zipf => Zipf::new((span + 1) as f64, 1.0)
                .map(SizeDist::Zipf)
                .map_err(|e| BenchError::config(format!("entry size range {min}..={max}: {e}")))?,
        };

        Ok(SizeGen {
            dist,
            min,
            rng: SmallRng::seed_from_u64(seed),
        })
    }

    pub fn get_size(&mut self) -> u64 {
        match &self.dist {
            SizeDist::Uniform(u) => u.sample(&mut self.rng),
            // zipf samples are ranks in [1, span + 1]
            SizeDist::Zipf(z) => self.min + z.sample(&mut self.rng) as u64 - 1,
        }
    }
}

/// Encodes `id` into a terminated key. The low 56 bits of the id are kept,
/// little-endian, and the last byte is always zero.
pub fn key_bytes(id: u64) -> [u8; KEY_LEN] {
    let mut key = id.to_le_bytes();
    key[KEY_LEN - 1] = 0;
    key
}

/// A terminated value of `len` filler bytes. `len` must be non-zero.
pub fn value_bytes(len: usize) -> Result<Box<[u8]>, BenchError> {
    let mut bytes = Vec::new();
    bytes
        .try_reserve_exact(len)
        .map_err(|source| BenchError::Allocation {
            what: "entry value",
            source,
        })?;
    bytes.resize(len, FILLER);
    if let Some(last) = bytes.last_mut() {
        *last = 0;
    }
    Ok(bytes.into_boxed_slice())
}
