use std::num::NonZeroUsize;
use std::time::Duration;

/// Concurrency levels tested when none are configured.
pub const DEFAULT_LEVELS: [usize; 8] = [1, 5, 10, 20, 40, 80, 160, 320];

/// Pause before each round so the server can settle.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Upper bound on a single round. Not expected to trigger in practice.
pub const DEFAULT_WAIT_BOUND: Duration = Duration::from_secs(1000);

pub const DEFAULT_REPLICA: u32 = 0;

pub const DEFAULT_SERVER: &str = "tm1";

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Drilldown over the ReadTest cube, sent unchanged on every invocation.
pub const DEFAULT_MDX: &str = "\
SELECT {DRILLDOWNMEMBER({[ReadTest Dimension 4].[ReadTest Dimension 4].[Total ReadTest Dimension 4]},
{[ReadTest Dimension 4].[ReadTest Dimension 4].[Total ReadTest Dimension 4]})} ON 0,
{DRILLDOWNMEMBER({[ReadTest Dimension 3].[ReadTest Dimension 3].[Total ReadTest Dimension 3]},
{[ReadTest Dimension 3].[ReadTest Dimension 3].[Total ReadTest Dimension 3]})} ON 1
FROM [ReadTest]
WHERE ([ReadTest Dimension 1].[ReadTest Dimension 1].[Total ReadTest Dimension 1],
[ReadTest Dimension 2].[ReadTest Dimension 2].[Total ReadTest Dimension 2])";

pub fn default_levels() -> Vec<NonZeroUsize> {
    DEFAULT_LEVELS
        .iter()
        .filter_map(|level| NonZeroUsize::new(*level))
        .collect()
}
