use clap::Parser;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::colors::ColorMode;

pub struct TestRunnerConfig {
    pub base_dir: PathBuf, // Path to the base folder of all test files
    pub quiet: bool,
    pub pgo: bool,
    pub color: ColorMode,
    pub forever: bool,
    pub jobs: usize,
    pub use_resources: Vec<String>,
    pub interactive: bool,
}

pub fn global_config() -> &'static TestRunnerConfig {
    static CONFIG: OnceLock<TestRunnerConfig> = OnceLock::new();
    CONFIG.get_or_init(|| {
        let args = Args::parse();

        let base_dir = args.base_folder.canonicalize().unwrap();
        let jobs = args.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|count| count.get())
                .unwrap_or(1)
        });

        TestRunnerConfig {
            base_dir,
            quiet: args.quiet,
            pgo: args.pgo,
            color: args.color,
            forever: args.forever,
            jobs,
            use_resources: args.use_resources,
            interactive: args.interactive,
        }
    })
}

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args {
    /// Path to the base folder of all test files
    #[arg(long)]
    base_folder: PathBuf,

    /// Suppress progress lines for passing tests.
    #[arg(short, long, default_value_t = false)]
    quiet: bool,

    /// Keep the progress output stable for profile-guided builds.
    #[arg(long, default_value_t = false)]
    pgo: bool,

    /// When to color the output.
    #[arg(long, value_enum, default_value = "auto")]
    color: ColorMode,

    /// Rerun the whole suite until a test fails.
    #[arg(short = 'F', long, default_value_t = false)]
    forever: bool,

    /// Maximum number of tests running at once. Defaults to the number of
    /// available processing units.
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Enable a named optional resource. Can be given more than once.
    #[arg(short = 'u', long = "use", value_name = "RESOURCE")]
    use_resources: Vec<String>,

    /// Ask before overwriting approved snapshot files.
    #[arg(long, default_value_t = false)]
    interactive: bool,
}
