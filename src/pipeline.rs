//! Staged resolution of one root spell into model and texture files.
//!
//! A task walks the primary chain (stages 1 to 6) and, starting from the
//! same stage-1 visual ids, the side chain. Every stage fans out one lookup
//! per input id, waits for all of them, and unions the outputs. The first
//! failed lookup aborts the task.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::time::{Duration, Instant};

use futures::future::{join, try_join, try_join_all};

use crate::Identifier;
use crate::error::{LookupError, TaskFailure};
use crate::fetcher::{RecordFetcher, Version};
use crate::progress::Report;
use crate::schema::{PRIMARY, SIDE, SPELL_NAME, SPELL_VISUALS};
use crate::source::UNKNOWN_CATEGORY;

/// Distinct ids produced by one stage.
pub type StageSet = BTreeSet<Identifier>;

/// Progress of a resolution task, from [`Stage::START`] to [`Stage::DONE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Stage(u8);

impl Stage {
    pub const START: Stage = Stage(0);
    pub const VISUALS: Stage = Stage(1);
    pub const FILES: Stage = Stage(6);
    pub const DONE: Stage = Stage(7);

    pub const fn new(value: u8) -> Self {
        if value > Self::DONE.0 {
            Self::DONE
        } else {
            Stage(value)
        }
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    pub const fn is_done(self) -> bool {
        self.0 == Self::DONE.0
    }

    pub const fn next(self) -> Self {
        Self::new(self.0 + 1)
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.0, Self::DONE.0)
    }
}

/// A finished resolution task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    pub root: Identifier,
    pub name: String,
    pub category: String,
    /// Model files.
    pub primary: BTreeSet<String>,
    /// Texture files.
    pub side: BTreeSet<String>,
    pub elapsed: Duration,
}

/// One root spell's run through both chains.
pub struct ResolutionTask<'a> {
    fetcher: &'a RecordFetcher,
    root: Identifier,
}

impl<'a> ResolutionTask<'a> {
    pub fn new(fetcher: &'a RecordFetcher, root: Identifier) -> Self {
        Self { fetcher, root }
    }

    /// Runs the task to completion, reporting every stage reached to
    /// `report`. Stages are reported in order without gaps, and
    /// [`Stage::DONE`] is reported only when the task succeeds.
    pub async fn run(self, report: &mut impl Report) -> Result<TaskOutcome, TaskFailure> {
        let start = Instant::now();
        let root = self.root;

        let (name, category) = self.describe().await;
        report.label(&name);
        report.report(Stage::START);

        match self.chains(report).await {
            Ok((primary, side)) => {
                report.report(Stage::DONE);
                tracing::info!(
                    root,
                    models = primary.len(),
                    textures = side.len(),
                    "resolved"
                );

                Ok(TaskOutcome {
                    root,
                    name,
                    category,
                    primary,
                    side,
                    elapsed: start.elapsed(),
                })
            }
            Err(source) => {
                let stage = report.stage();
                report.fail();
                tracing::error!(root, %stage, "task aborted: {source}");

                Err(TaskFailure {
                    root,
                    stage,
                    source,
                })
            }
        }
    }

    /// Stage 0. Neither lookup is allowed to fail the task.
    async fn describe(&self) -> (String, String) {
        let (name, category) = join(
            self.fetcher.display_name(SPELL_NAME, self.root),
            self.fetcher.classify(self.root),
        )
        .await;

        let name = match name {
            Ok(Some(name)) => name,
            Ok(None) => self.root.to_string(),
            Err(err) => {
                tracing::warn!(root = self.root, "couldn't resolve spell name: {err}");
                self.root.to_string()
            }
        };

        let category = category.unwrap_or_else(|err| {
            tracing::warn!(root = self.root, "couldn't classify spell: {err}");
            UNKNOWN_CATEGORY.to_string()
        });

        (name, category)
    }

    async fn chains(
        &self,
        report: &mut impl Report,
    ) -> Result<(BTreeSet<String>, BTreeSet<String>), LookupError> {
        let fetcher = self.fetcher;
        let roots = StageSet::from([self.root]);
        let visuals = fan_out(&roots, move |id| {
            fetcher.hop(&SPELL_VISUALS, id, Version::Latest)
        })
        .await?;
        report.report(Stage::VISUALS);

        try_join(
            primary_chain(fetcher, &visuals, report),
            side_chain(fetcher, &visuals),
        )
        .await
    }
}

/// Stages 2 to 6: visual ids to model file names.
async fn primary_chain(
    fetcher: &RecordFetcher,
    visuals: &StageSet,
    report: &mut impl Report,
) -> Result<BTreeSet<String>, LookupError> {
    let mut ids = visuals.clone();
    let mut stage = Stage::VISUALS;

    for hop in &PRIMARY {
        ids = fan_out(&ids, move |id| fetcher.hop(hop, id, Version::Latest)).await?;
        stage = stage.next();
        report.report(stage);
    }

    let files = fan_out(&ids, move |id| fetcher.file_search(id)).await?;
    report.report(Stage::FILES);

    Ok(files)
}

/// Visual ids to texture file names, pinned to the side-chain data version.
async fn side_chain(
    fetcher: &RecordFetcher,
    visuals: &StageSet,
) -> Result<BTreeSet<String>, LookupError> {
    let mut ids = visuals.clone();

    for hop in &SIDE {
        ids = fan_out(&ids, move |id| fetcher.hop(hop, id, Version::Side)).await?;
    }

    fan_out(&ids, move |id| fetcher.file_search(id)).await
}

/// Issues `lookup` for every input concurrently and unions the results.
/// An empty input issues nothing.
async fn fan_out<T, F, Fut>(inputs: &StageSet, lookup: F) -> Result<BTreeSet<T>, LookupError>
where
    T: Ord,
    F: Fn(Identifier) -> Fut,
    Fut: Future<Output = Result<Vec<T>, LookupError>>,
{
    if inputs.is_empty() {
        return Ok(BTreeSet::new());
    }

    let outputs = try_join_all(inputs.iter().map(|&id| lookup(id))).await?;
    Ok(outputs.into_iter().flatten().collect())
}
