use indicatif::{ProgressBar, ProgressStyle, style::TemplateError};

pub fn bar(header: String, length: u64) -> Result<ProgressBar, TemplateError> {
    let pb = ProgressBar::new(length);
    pb.set_prefix(header);
    pb.set_style(
        ProgressStyle::with_template("{prefix} {pos}/{len}\n[{wide_bar:.cyan/blue}]")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}
