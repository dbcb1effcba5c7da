use crate::db::CampaignId;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

// 41 bits of milliseconds + 10 bits of machine id + 12 bits of sequence,
// 63 bits total, so ids stay positive through a signed BIGINT column.
const EPOCH_MS: u64 = 1_704_067_200_000; // 2024-01-01T00:00:00Z
const MACHINE_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const MAX_MACHINE_ID: u16 = (1 << MACHINE_BITS) - 1;
const MAX_SEQUENCE: u16 = (1 << SEQUENCE_BITS) - 1;

/// Errors that can occur while generating an identifier.
/// All of them are terminal for the operation in progress; there are no
/// internal retries.
#[derive(Error, Debug)]
pub enum IdGenError {
    #[error("Machine id {0} exceeds the {MAX_MACHINE_ID} maximum")]
    InvalidMachineId(u16),

    #[error("Clock moved backwards: last tick {last}, current tick {now}")]
    ClockDrift { last: u64, now: u64 },

    #[error("Sequence exhausted within millisecond tick {0}")]
    SequenceExhausted(u64),
}

/// IdGenerator trait issuing globally unique, roughly time-ordered 64-bit
/// identifiers without coordinating with the relational store
pub trait IdGenerator: Send + Sync + 'static {
    fn next_id(&self) -> Result<CampaignId, IdGenError>;
}

struct GeneratorState {
    last_tick: u64,
    sequence: u16,
}

/// Snowflake-layout generator: millisecond tick since a fixed epoch, a
/// configured machine id, and a per-millisecond sequence
pub struct SnowflakeIdGenerator {
    machine_id: u16,
    state: Mutex<GeneratorState>,
}

impl SnowflakeIdGenerator {
    pub fn new(machine_id: u16) -> Result<Self, IdGenError> {
        if machine_id > MAX_MACHINE_ID {
            return Err(IdGenError::InvalidMachineId(machine_id));
        }
        Ok(SnowflakeIdGenerator {
            machine_id,
            state: Mutex::new(GeneratorState {
                last_tick: 0,
                sequence: 0,
            }),
        })
    }

    fn current_tick() -> Result<u64, IdGenError> {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        if now_ms < EPOCH_MS {
            return Err(IdGenError::ClockDrift {
                last: 0,
                now: now_ms,
            });
        }
        Ok(now_ms - EPOCH_MS)
    }
}

/// Advance the generator state by one issued id at the given tick
fn step(state: &mut GeneratorState, tick: u64, machine_id: u16) -> Result<u64, IdGenError> {
    if tick < state.last_tick {
        return Err(IdGenError::ClockDrift {
            last: state.last_tick,
            now: tick,
        });
    }

    if tick == state.last_tick {
        if state.sequence == MAX_SEQUENCE {
            return Err(IdGenError::SequenceExhausted(tick));
        }
        state.sequence += 1;
    } else {
        state.last_tick = tick;
        state.sequence = 0;
    }

    Ok((state.last_tick << (MACHINE_BITS + SEQUENCE_BITS))
        | ((machine_id as u64) << SEQUENCE_BITS)
        | state.sequence as u64)
}

impl IdGenerator for SnowflakeIdGenerator {
    fn next_id(&self) -> Result<CampaignId, IdGenError> {
        let tick = Self::current_tick()?;
        let mut state = self.state.lock().unwrap();
        step(&mut state, tick, self.machine_id)
    }
}

impl<T: IdGenerator + ?Sized> IdGenerator for std::sync::Arc<T> {
    fn next_id(&self) -> Result<CampaignId, IdGenError> {
        (**self).next_id()
    }
}
