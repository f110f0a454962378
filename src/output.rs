use crate::models::{AnalysisResult, Vocabulary};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Output format options
#[derive(Debug, Clone, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    Plain,
    Json,
}

/// Headline figures computed from an analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub complete: usize,
    pub degraded: usize,
    pub mean_feedback: f64,
    pub median_feedback: f64,
    pub mean_success: f64,
    pub median_success: f64,
    /// Average number of input turns per conversation
    pub mean_length: f64,
    /// Topics assigned by labeling, most frequent first
    pub topic_counts: Vec<(String, usize)>,
    /// Themes assigned by labeling, most frequent first
    pub theme_counts: Vec<(String, usize)>,
}

impl Summary {
    pub fn from_result(result: &AnalysisResult) -> Self {
        let labeled: Vec<_> = result.data.iter().filter_map(|entry| entry.as_complete()).collect();
        let feedback: Vec<f64> = labeled.iter().map(|labels| labels.feedback_score).collect();
        let success: Vec<f64> = labeled.iter().map(|labels| labels.success_score).collect();
        let lengths: Vec<f64> = result.data.iter().map(|entry| entry.length() as f64).collect();

        Self {
            total: result.data.len(),
            complete: labeled.len(),
            degraded: result.data.len() - labeled.len(),
            mean_feedback: calculate_mean(&feedback),
            median_feedback: calculate_median(&feedback),
            mean_success: calculate_mean(&success),
            median_success: calculate_median(&success),
            mean_length: calculate_mean(&lengths),
            topic_counts: count_labels(labeled.iter().map(|labels| labels.topic.as_str())),
            theme_counts: count_labels(
                labeled
                    .iter()
                    .flat_map(|labels| labels.themes.iter().map(String::as_str)),
            ),
        }
    }
}

/// Calculate mean, 0.0 when empty
fn calculate_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum: f64 = values.iter().sum();
    sum / values.len() as f64
}

/// Calculate median, 0.0 when empty
fn calculate_median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Occurrences per label, by descending count then label
fn count_labels<'a>(labels: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut frequency: HashMap<&str, usize> = HashMap::new();
    for label in labels {
        *frequency.entry(label).or_insert(0) += 1;
    }

    let mut counts: Vec<(String, usize)> = frequency
        .into_iter()
        .map(|(label, count)| (label.to_string(), count))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

/// Print the analysis result in the specified format
pub fn print_results(result: &AnalysisResult, format: OutputFormat) {
    match format {
        OutputFormat::Plain => print_plain(result),
        OutputFormat::Json => print_json(result),
    }
}

/// Print a summary report in plain text format
fn print_plain(result: &AnalysisResult) {
    let summary = Summary::from_result(result);

    println!("=== Conversation Analysis ===");
    println!();

    println!("📊 METRICS");
    println!("----------");
    println!("Conversations:           {}", summary.total);
    println!("Labeled:                 {}", summary.complete);
    println!("Unparsed responses:      {}", summary.degraded);
    println!("Average feedback score:  {:.2}/1.0", summary.mean_feedback);
    println!("Median feedback score:   {:.2}/1.0", summary.median_feedback);
    println!("Success rate:            {:.1}%", summary.mean_success * 100.0);
    println!("Median success score:    {:.2}/1.0", summary.median_success);
    println!("Avg conversation length: {:.1} turns", summary.mean_length);
    println!();

    print_distribution("🏷  TOPIC DISTRIBUTION", &summary.topic_counts);
    print_distribution("🧵 THEME DISTRIBUTION", &summary.theme_counts);

    print_vocabulary("📚 DISCOVERED TOPICS", &result.commons.topics);
    print_vocabulary("📚 DISCOVERED THEMES", &result.commons.themes);
}

fn print_distribution(title: &str, counts: &[(String, usize)]) {
    println!("{}", title);
    println!("{}", "-".repeat(title.chars().count()));

    if counts.is_empty() {
        println!("No labels assigned.");
    } else {
        println!("{:<40} {:>6}", "Label", "Count");
        println!("{}", "-".repeat(47));
        for (label, count) in counts {
            println!("{:<40} {:>6}", label, count);
        }
    }
    println!();
}

fn print_vocabulary(title: &str, vocabulary: &Vocabulary) {
    println!("{}", title);
    println!("{}", "-".repeat(title.chars().count()));

    if vocabulary.is_empty() {
        println!("Nothing discovered.");
    } else {
        for (label, count) in vocabulary.iter() {
            println!("  • {} ({})", label, count);
        }
    }
    println!();
}

/// Render the full result as the JSON document written to stdout
pub fn render_json(result: &AnalysisResult) -> serde_json::Result<String> {
    serde_json::to_string_pretty(result)
}

/// Print results in JSON format
fn print_json(result: &AnalysisResult) {
    match render_json(result) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing results to JSON: {}", e),
    }
}
