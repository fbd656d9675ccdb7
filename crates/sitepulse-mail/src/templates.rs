use sitepulse_core::{CrawlStats, JobId};

pub struct EmailTemplate {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Plain-text notice sent when a job completes.
pub fn render_completion(
    app_name: &str,
    to: &str,
    job_id: &JobId,
    site_url: &str,
    stats: &CrawlStats,
) -> EmailTemplate {
    let completion_rate = if stats.total_pages > 0 {
        stats.ai_succeeded * 100 / stats.total_pages
    } else {
        100
    };

    let body = format!(
        "{app_name} - Your Report is Ready!\n\
         \n\
         Analysis Complete\n\
         \n\
         We've finished crawling and analysing your website.\n\
         \n\
         Website: {site_url}\n\
         Job ID: {job_id}\n\
         Pages Crawled: {crawled} of {total}\n\
         Failed Pages: {failed}\n\
         AI Analysed: {ai}\n\
         Completion Rate: {completion_rate}%\n\
         Finished: {finished}\n\
         \n\
         Thank you for using {app_name}!\n",
        crawled = stats.successful_pages,
        total = stats.total_pages,
        failed = stats.failed_pages,
        ai = stats.ai_succeeded,
        finished = stats.completed_at.format("%Y-%m-%d %H:%M UTC"),
    );

    EmailTemplate {
        to: to.to_string(),
        subject: format!("Your {app_name} analysis is complete!"),
        body,
    }
}
