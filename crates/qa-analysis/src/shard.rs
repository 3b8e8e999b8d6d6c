//! Parallel processing of independent event shards.
//!
//! Each shard gets its own [`Engine`]; the engines are merged afterwards,
//! so no accumulator is ever shared between threads.

use std::sync::Arc;

use qa_core::Result;
use rayon::prelude::*;

use crate::config::AnalysisConfig;
use crate::efficiency::EfficiencyTable;
use crate::engine::Engine;
use crate::event::{BranchSchema, Event};

/// Process `shards` on the rayon pool and merge the per-shard engines.
///
/// The result is not finalized and is equivalent to one engine fed the
/// concatenation of all shards.
pub fn run_sharded<S, E>(
    config: &AnalysisConfig,
    schema: &S,
    efficiency: Option<Arc<EfficiencyTable>>,
    shards: &[Vec<E>],
) -> Result<Engine>
where
    S: BranchSchema + Sync + ?Sized,
    E: Event + Sync,
{
    let engines = shards
        .par_iter()
        .map(|shard| {
            let mut engine = Engine::new(config.clone(), schema, efficiency.clone())?;
            for event in shard {
                engine.process(event)?;
            }
            Ok(engine)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut engines = engines.into_iter();
    let Some(mut merged) = engines.next() else {
        return Engine::new(config.clone(), schema, efficiency);
    };
    for engine in engines {
        merged = merged.merged(&engine)?;
    }
    log::info!("merged {} shards ({} events)", shards.len(), merged.stats().events_seen);
    Ok(merged)
}
