// file: src/pipeline/progress.rs
// description: progress tracking and statistics reporting for crawl runs
// reference: uses indicatif for progress bars and tracks processing metrics

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub links_found: usize,
    pub articles_extracted: usize,
    pub articles_failed: usize,
    pub indicators_produced: usize,
    pub duration_secs: u64,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn articles_per_second(&self) -> f64 {
        if self.duration_secs == 0 {
            return 0.0;
        }
        self.articles_extracted as f64 / self.duration_secs as f64
    }

    pub fn extraction_success_rate(&self) -> f64 {
        let total = self.articles_extracted + self.articles_failed;
        if total == 0 {
            return 0.0;
        }
        (self.articles_extracted as f64 / total as f64) * 100.0
    }
}

pub struct ProgressTracker {
    main_bar: ProgressBar,
    detail_bar: ProgressBar,
    articles_extracted: Arc<AtomicUsize>,
    articles_failed: Arc<AtomicUsize>,
    start_time: Instant,
}

impl ProgressTracker {
    pub fn with_color(total_articles: usize, colored: bool) -> Self {
        let multi_progress = MultiProgress::new();

        let main_bar = create_progress_bar(&multi_progress, total_articles as u64, colored);
        let detail_bar = create_detail_bar(&multi_progress);

        Self {
            main_bar,
            detail_bar,
            articles_extracted: Arc::new(AtomicUsize::new(0)),
            articles_failed: Arc::new(AtomicUsize::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_extracted(&self) {
        self.articles_extracted.fetch_add(1, Ordering::SeqCst);
        self.main_bar.inc(1);
        self.update_detail_bar();
    }

    pub fn inc_failed(&self) {
        self.articles_failed.fetch_add(1, Ordering::SeqCst);
        self.main_bar.inc(1);
        self.update_detail_bar();
    }

    pub fn set_message(&self, message: String) {
        self.detail_bar.set_message(message);
    }

    pub fn finish(&self) {
        self.main_bar.finish_with_message("Crawl complete");
        self.detail_bar.finish_and_clear();
    }

    pub fn extracted(&self) -> usize {
        self.articles_extracted.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> usize {
        self.articles_failed.load(Ordering::SeqCst)
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    fn update_detail_bar(&self) {
        let extracted = self.articles_extracted.load(Ordering::SeqCst);
        let failed = self.articles_failed.load(Ordering::SeqCst);

        let message = format!("Extracted: {} | Failed: {}", extracted, failed);

        self.detail_bar.set_message(message);
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        self.finish();
    }
}

fn create_progress_bar(multi_progress: &MultiProgress, total: u64, colored: bool) -> ProgressBar {
    let bar = multi_progress.add(ProgressBar::new(total));
    if colored {
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
                )
                .expect("Failed to create progress bar template")
                .progress_chars("█▓▒░"),
        );
    } else {
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({eta}) {msg}")
                .expect("Failed to create progress bar template")
                .progress_chars("=>-"),
        );
    }
    bar
}

fn create_detail_bar(multi_progress: &MultiProgress) -> ProgressBar {
    let bar = multi_progress.add(ProgressBar::new(0));
    let style = ProgressStyle::default_bar()
        .template("{msg}")
        .expect("Failed to create detail bar template");
    bar.set_style(style);
    bar
}
