use ammonia;

/// Clean grader-supplied HTML using the ammonia library.
///
/// Whitelist-based: keeps formatting tags (<b>, <p>, <ul>) and strips
/// scripts, iframes and event-handler attributes. Feedback is rendered
/// back to students, so it is cleaned before it is stored.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
