use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

use crate::analysis::AnalysisReport;
use crate::utils::{NumberFormatOptions, format_number};

/// Write every summary table for a finished run into `out_dir`.
pub fn write_reports(
    report: &AnalysisReport,
    out_dir: &Path,
    options: &NumberFormatOptions,
) -> Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let tables = [
        ("member_summary.csv", member_summary_csv(report, options)),
        ("chat_summary.csv", chat_summary_csv(report, options)),
        ("most_popular_messages.csv", popular_messages_csv(report)),
    ];
    for (file_name, content) in tables {
        let path = out_dir.join(file_name);
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    if !report.keyword_counts.is_empty() {
        let path = out_dir.join("keyword_counts.csv");
        std::fs::write(&path, keyword_counts_csv(report))
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    Ok(())
}

/// One row per member with every counter and derived field, plus one column
/// per configured keyword group.
pub fn member_summary_csv(report: &AnalysisReport, options: &NumberFormatOptions) -> String {
    let mut headers = vec![
        "Member",
        "Messages Sent",
        "Average Word Count",
        "Reactions Received",
        "Reactions Given",
        "Likes Received",
        "Likes Given",
        "Dislikes Received",
        "Dislikes Given",
        "Biggest Fan",
        "Biggest Supporter Of",
        "Avg Likes Per Post",
        "Most Active Day",
        "Most Active Hour",
        "Images Sent",
        "Polls Made",
    ];
    headers.extend(report.keyword_counts.keys().map(String::as_str));

    let mut out = String::new();
    write_row(&mut out, headers.iter().map(|h| h.to_string()));

    let prec = options.decimal_places;
    for (name, stats) in &report.member_stats {
        let mut row = vec![
            name.clone(),
            format_number(stats.messages_sent, options),
            format!("{:.prec$}", stats.average_word_count),
            format_number(stats.reactions_received, options),
            format_number(stats.reactions_given, options),
            format_number(stats.hearts_received, options),
            format_number(stats.hearts_given, options),
            format_number(stats.dislikes_received, options),
            format_number(stats.dislikes_given, options),
            stats.biggest_fan.clone(),
            stats.biggest_supporter_of.clone(),
            format!("{:.prec$}", stats.heart_message_ratio),
            stats.most_active_day.clone(),
            stats.most_active_hour.clone(),
            format_number(stats.images_sent, options),
            format_number(stats.polls_made, options),
        ];
        for members in report.keyword_counts.values() {
            row.push(format_number(members.get(name).copied().unwrap_or(0), options));
        }
        write_row(&mut out, row);
    }

    out
}

/// Stat/Value rows for the chat-wide totals.
pub fn chat_summary_csv(report: &AnalysisReport, options: &NumberFormatOptions) -> String {
    let chat = &report.chat_stats;
    let prec = options.decimal_places;
    let rows = [
        ("chat_name", report.chat_name.clone()),
        ("num_messages", format_number(chat.num_messages, options)),
        (
            "average_word_count",
            format!("{:.prec$}", chat.average_word_count),
        ),
        ("total_reactions", format_number(chat.total_reactions, options)),
        ("total_likes", format_number(chat.total_likes, options)),
        ("total_dislikes", format_number(chat.total_dislikes, options)),
        (
            "total_image_attachments",
            format_number(chat.total_image_attachments, options),
        ),
        ("total_polls", format_number(chat.total_polls, options)),
    ];

    let mut out = String::new();
    write_row(&mut out, ["Stat".to_string(), "Value".to_string()]);
    for (stat, value) in rows {
        write_row(&mut out, [stat.to_string(), value]);
    }
    out
}

/// The ranked most-liked messages, one row per superlative.
pub fn popular_messages_csv(report: &AnalysisReport) -> String {
    let mut out = String::new();
    write_row(
        &mut out,
        [
            "Rank".to_string(),
            "Poster".to_string(),
            "Posted At".to_string(),
            "Text".to_string(),
            "Image".to_string(),
            "Likers".to_string(),
            "Total Likes".to_string(),
        ],
    );

    for (rank, message) in report.best_messages.iter().enumerate() {
        write_row(
            &mut out,
            [
                (rank + 1).to_string(),
                message.poster.clone(),
                message.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                message.text.clone().unwrap_or_default(),
                message.image_attachment.clone().unwrap_or_default(),
                message.likers.join("; "),
                message.total_likes.to_string(),
            ],
        );
    }
    out
}

/// Keyword occurrences as group/member/count rows.
pub fn keyword_counts_csv(report: &AnalysisReport) -> String {
    let mut out = String::new();
    write_row(
        &mut out,
        [
            "Keyword".to_string(),
            "Member".to_string(),
            "Count".to_string(),
        ],
    );
    for (group, members) in &report.keyword_counts {
        for (member, count) in members {
            write_row(&mut out, [group.clone(), member.clone(), count.to_string()]);
        }
    }
    out
}

fn write_row(out: &mut String, fields: impl IntoIterator<Item = String>) {
    let mut first = true;
    for field in fields {
        if !first {
            out.push(',');
        }
        first = false;
        let _ = write!(out, "{}", escape_csv(&field));
    }
    out.push('\n');
}

/// Quote a field when it contains a separator, quote or newline.
fn escape_csv(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
