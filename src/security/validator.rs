use lazy_static::lazy_static;
use regex::Regex;

/// TMDB 电影 ID 的合法区间
const MOVIE_ID_MIN: i64 = 1;
const MOVIE_ID_MAX: i64 = 999_999_999;

/// 文本字段的最大长度
const MAX_TEXT_LENGTH: usize = 1000;

lazy_static! {
    static ref HTML_TAG_RE: Regex = Regex::new(r"<[^>]+>").expect("valid html tag regex");
    static ref DANGEROUS_CHAR_RE: Regex =
        Regex::new(r#"[<>"']"#).expect("valid dangerous char regex");
    static ref BOT_UA_RE: Regex = Regex::new(
        r"(?i)bot|crawler|spider|scraper|curl|wget|python-requests|postman|insomnia"
    )
    .expect("valid bot user agent regex");
}

/// 检查电影 ID 是否在合法区间内
pub fn is_valid_movie_id(movie_id: i64) -> bool {
    (MOVIE_ID_MIN..=MOVIE_ID_MAX).contains(&movie_id)
}

/// 解析并校验来自表单/查询串的电影 ID
pub fn parse_movie_id(raw: &str) -> Option<i64> {
    let id = raw.trim().parse::<i64>().ok()?;
    is_valid_movie_id(id).then_some(id)
}

/// 清洗自由文本：去掉 HTML 标签和危险字符，截断到上限
pub fn sanitize_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let stripped = HTML_TAG_RE.replace_all(text, "");
    let cleaned = DANGEROUS_CHAR_RE.replace_all(&stripped, "");

    cleaned
        .chars()
        .take(MAX_TEXT_LENGTH)
        .collect::<String>()
        .trim()
        .to_string()
}

/// 判断 User-Agent 是否属于已知的机器访问特征
///
/// 缺失 UA 一律按可疑处理。
pub fn is_bot_user_agent(user_agent: Option<&str>) -> bool {
    match user_agent {
        Some(ua) if !ua.is_empty() => BOT_UA_RE.is_match(ua),
        _ => true,
    }
}
