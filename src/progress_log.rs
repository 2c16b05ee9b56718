use std::io::{self, Write};
use std::time::Instant;

use crate::colors;
use crate::global_configuration::TestRunnerConfig;
use crate::load::{
    LoadSampler, NativeLoadSampler, PlatformLoadTracker, TrackedLoadSampler, NATIVE_LOAD_API,
};
use crate::results::{State, TestResults};
use crate::test_runner::RunPlan;
use crate::utils::print_warning;

/// Writes the live status lines of a run: elapsed time, system load, and the
/// pass/fail counter. One instance per run, driven from the control task.
pub struct Logger {
    start_time: Instant,
    color_enabled: bool,
    // Available processing units; the boundary between comfortable and
    // overloaded in the load display.
    load_threshold: usize,
    quiet: bool,
    pgo: bool,
    test_count_text: String,
    test_count_width: usize,
    load_sampler: Option<Box<dyn LoadSampler>>,
}

impl Logger {
    pub fn new(config: &TestRunnerConfig) -> Self {
        Self {
            start_time: Instant::now(),
            color_enabled: config.color.resolve(),
            load_threshold: std::thread::available_parallelism()
                .map(|count| count.get())
                .unwrap_or(1),
            quiet: config.quiet,
            pgo: config.pgo,
            test_count_text: String::new(),
            test_count_width: 3,
            load_sampler: None,
        }
    }

    pub fn error(&self, text: &str) -> String {
        colors::error(text, self.color_enabled)
    }

    pub fn warning(&self, text: &str) -> String {
        colors::warning(text, self.color_enabled)
    }

    pub fn good(&self, text: &str) -> String {
        colors::good(text, self.color_enabled)
    }

    /// Format a load average with two decimals, colored by how it compares
    /// to the number of available processing units.
    pub fn load_color(&self, load_avg: f64) -> String {
        let load = format!("{:.2}", load_avg);
        let threshold = self.load_threshold as f64;
        if load_avg < threshold {
            self.good(&load)
        } else if load_avg < threshold * 2.0 {
            self.warning(&load)
        } else {
            self.error(&load)
        }
    }

    pub fn state_color(&self, text: &str, state: Option<State>) -> String {
        let Some(state) = state else {
            return text.to_string();
        };
        if !self.color_enabled {
            return text.to_string();
        }
        if state.is_ok() {
            self.good(text)
        } else if state.is_skip() {
            self.warning(text)
        } else {
            self.error(text)
        }
    }

    /// Write one status line to stdout, prefixed with the current system
    /// load (when a sample is available) and the elapsed run time.
    pub fn log(&mut self, line: &str) {
        let composed = self.compose_line(line);
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{}", composed);
        let _ = stdout.flush();
    }

    fn compose_line(&mut self, line: &str) -> String {
        let mut composed = String::new();

        // system load prefix: "load avg: 1.80 "
        if let Some(load_avg) = self.get_load_avg() {
            composed.push_str("load avg: ");
            composed.push_str(&self.load_color(load_avg));
            composed.push(' ');
        }

        // timestamp prefix: "0:01:05 "
        composed.push_str(&format_elapsed(self.start_time.elapsed().as_secs()));
        composed.push(' ');

        composed.push_str(line);
        if line.is_empty() {
            composed.pop();
        }
        composed
    }

    pub fn get_load_avg(&mut self) -> Option<f64> {
        self.load_sampler.as_mut()?.load_average()
    }

    /// Render "[ 51/405/1] test_x passed" and echo the captured output of
    /// the test, if any, as a separate unprefixed block.
    pub fn display_progress(
        &mut self,
        results: &TestResults,
        test_index: usize,
        text: &str,
        stdout: Option<&str>,
    ) {
        let counter = self.progress_counter(results, test_index);
        self.log(&format!("[{}] {}", counter, text));

        if let Some(captured) = stdout {
            let mut out = io::stdout().lock();
            let _ = writeln!(out, "{}", captured);
            let _ = out.flush();
        }
    }

    fn progress_counter(&self, results: &TestResults, test_index: usize) -> String {
        let index = format!("{:>width$}", test_index, width = self.test_count_width);
        let mut counter = format!("{}{}", self.good(&index), self.test_count_text);
        let fails = results.fails();
        if fails > 0 && !self.pgo && !self.quiet {
            counter = format!("{}/{}", counter, self.error(&fails.to_string()));
        }
        counter
    }

    pub fn set_tests(&mut self, plan: &RunPlan) {
        if plan.forever {
            self.test_count_text = String::new();
            self.test_count_width = 3;
        } else {
            self.test_count_text = format!("/{}", plan.total);
            self.test_count_width = self.test_count_text.len() - 1;
        }
    }

    pub fn start_load_tracker(&mut self) {
        if NATIVE_LOAD_API {
            self.load_sampler = Some(Box::new(NativeLoadSampler));
            return;
        }

        match PlatformLoadTracker::start() {
            Ok(tracker) => {
                self.load_sampler = Some(Box::new(TrackedLoadSampler::new(tracker)));
            }
            Err(error) => {
                // Restricted accounts may not be able to read the counters;
                // the run continues without a load display.
                print_warning(format!("failed to start the load tracker: {}", error));
            }
        }
    }

    pub fn stop_load_tracker(&mut self) {
        let Some(mut sampler) = self.load_sampler.take() else {
            return;
        };
        sampler.shutdown();
    }
}

pub fn format_elapsed(total_secs: u64) -> String {
    let (mins, secs) = (total_secs / 60, total_secs % 60);
    let (hours, mins) = (mins / 60, mins % 60);
    format!("{}:{:02}:{:02}", hours, mins, secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colors::{BOLD_GREEN, BOLD_RED, RESET, YELLOW};
    use crate::results::TestResult;

    fn test_logger(color_enabled: bool) -> Logger {
        Logger {
            start_time: Instant::now(),
            color_enabled,
            load_threshold: 4,
            quiet: false,
            pgo: false,
            test_count_text: String::new(),
            test_count_width: 3,
            load_sampler: None,
        }
    }

    fn results_with_fails(count: usize) -> TestResults {
        let mut results = TestResults::new();
        for test_index in 0..count {
            results.record(TestResult {
                test_index,
                state: State::Failed,
                error: None,
                stdout: String::new(),
            });
        }
        results
    }

    #[test]
    fn elapsed_time_uses_hours_minutes_seconds() {
        assert_eq!(format_elapsed(0), "0:00:00");
        assert_eq!(format_elapsed(59), "0:00:59");
        assert_eq!(format_elapsed(3925), "1:05:25");
        assert_eq!(format_elapsed(36_000), "10:00:00");
    }

    #[test]
    fn load_color_bands_are_inclusive_on_the_upper_side() {
        let logger = test_logger(true);
        assert_eq!(logger.load_color(3.99), format!("{}3.99{}", BOLD_GREEN, RESET));
        assert_eq!(logger.load_color(4.0), format!("{}4.00{}", YELLOW, RESET));
        assert_eq!(logger.load_color(7.99), format!("{}7.99{}", YELLOW, RESET));
        assert_eq!(logger.load_color(8.0), format!("{}8.00{}", BOLD_RED, RESET));
    }

    #[test]
    fn disabled_colors_are_the_identity() {
        let logger = test_logger(false);
        assert_eq!(logger.error("x"), "x");
        assert_eq!(logger.warning("x"), "x");
        assert_eq!(logger.good("x"), "x");
        assert_eq!(logger.load_color(9.5), "9.50");
    }

    #[test]
    fn state_color_maps_outcomes_to_severities() {
        let logger = test_logger(true);
        assert_eq!(
            logger.state_color("passed", Some(State::Passed)),
            format!("{}passed{}", BOLD_GREEN, RESET)
        );
        assert_eq!(
            logger.state_color("skipped", Some(State::Skipped)),
            format!("{}skipped{}", YELLOW, RESET)
        );
        assert_eq!(
            logger.state_color("denied", Some(State::ResourceDenied)),
            format!("{}denied{}", YELLOW, RESET)
        );
        assert_eq!(
            logger.state_color("failed", Some(State::Failed)),
            format!("{}failed{}", BOLD_RED, RESET)
        );
        assert_eq!(logger.state_color("plain", None), "plain");
    }

    #[test]
    fn set_tests_sizes_the_counter_to_the_total() {
        let mut logger = test_logger(false);
        logger.set_tests(&RunPlan {
            forever: false,
            total: 405,
        });
        assert_eq!(logger.test_count_text, "/405");
        assert_eq!(logger.test_count_width, 3);

        logger.set_tests(&RunPlan {
            forever: false,
            total: 1000,
        });
        assert_eq!(logger.test_count_text, "/1000");
        assert_eq!(logger.test_count_width, 4);
    }

    #[test]
    fn forever_mode_has_no_total_suffix() {
        let mut logger = test_logger(false);
        logger.set_tests(&RunPlan {
            forever: true,
            total: 17,
        });
        assert_eq!(logger.test_count_text, "");
        assert_eq!(logger.test_count_width, 3);
    }

    #[test]
    fn counter_right_aligns_the_index_and_appends_failures() {
        let mut logger = test_logger(false);
        logger.set_tests(&RunPlan {
            forever: false,
            total: 405,
        });

        let results = results_with_fails(1);
        assert_eq!(logger.progress_counter(&results, 51), " 51/405/1");
        assert_eq!(logger.progress_counter(&results, 5), "  5/405/1");
        assert_eq!(logger.progress_counter(&results, 1234), "1234/405/1");
    }

    #[test]
    fn counter_omits_the_failure_suffix_without_failures() {
        let mut logger = test_logger(false);
        logger.set_tests(&RunPlan {
            forever: false,
            total: 405,
        });

        let results = TestResults::new();
        assert_eq!(logger.progress_counter(&results, 51), " 51/405");
    }

    #[test]
    fn pgo_mode_never_shows_the_failure_suffix() {
        let mut logger = test_logger(false);
        logger.pgo = true;
        logger.set_tests(&RunPlan {
            forever: false,
            total: 405,
        });

        let results = results_with_fails(3);
        assert_eq!(logger.progress_counter(&results, 51), " 51/405");
    }

    #[test]
    fn quiet_mode_hides_the_failure_suffix() {
        let mut logger = test_logger(false);
        logger.quiet = true;
        logger.set_tests(&RunPlan {
            forever: false,
            total: 405,
        });

        let results = results_with_fails(2);
        assert_eq!(logger.progress_counter(&results, 51), " 51/405");
    }

    #[test]
    fn composed_lines_have_no_trailing_space_for_empty_text() {
        let mut logger = test_logger(false);
        assert_eq!(logger.compose_line(""), "0:00:00");
        assert_eq!(logger.compose_line("one test"), "0:00:00 one test");
    }

    #[test]
    fn missing_sampler_means_no_load_segment() {
        let mut logger = test_logger(false);
        assert_eq!(logger.get_load_avg(), None);
        assert!(!logger.compose_line("x").contains("load avg"));
    }

    #[test]
    fn stopping_an_unstarted_tracker_is_a_no_op() {
        let mut logger = test_logger(false);
        logger.stop_load_tracker();
        logger.stop_load_tracker();
        assert_eq!(logger.get_load_avg(), None);
    }
}
