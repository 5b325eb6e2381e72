//! Pure extraction of forums, threads and posts from fetched pages.
//!
//! Nothing here touches the network or the store. Optional fields that cannot
//! be found are left empty; rows missing their link are skipped.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::html::{block_text, first_match, first_text, inline_text, parse_count, selector, strip_glyphs};
use super::pagination::PagePattern;
use crate::constants::{AD_MARKERS, UNKNOWN_AUTHOR};
use crate::db::{NewForum, NewPost, NewThread};

struct ForumSelectors {
    group: Selector,
    group_label: Selector,
    row: Selector,
    link: Selector,
    description: Selector,
    stats: Selector,
}

static FORUM: LazyLock<ForumSelectors> = LazyLock::new(|| ForumSelectors {
    group: selector("div.containerGroup"),
    group_label: selector("h4"),
    row: selector("div.forum-row.catLink"),
    link: selector("a.categoryLink[href]"),
    description: selector("div.forumdesc"),
    stats: selector("div.col-md-1"),
});

struct ThreadSelectors {
    row: Selector,
    link: Selector,
    author: Selector,
    stats: Selector,
    stat_value: Selector,
    last_post: Selector,
    last_date: Selector,
    last_author: Selector,
}

static THREAD: LazyLock<ThreadSelectors> = LazyLock::new(|| ThreadSelectors {
    row: selector("div.row.forum-row"),
    link: selector("div.tclcon a[href]:not([itemprop='author'])"),
    author: selector("div.tclcon a[itemprop='author']"),
    stats: selector("div[itemprop='interactionStatistic']"),
    stat_value: selector("strong"),
    last_post: selector("div.lastpostlink"),
    last_date: selector("time"),
    last_author: selector("span.byuser a"),
});

struct PostSelectors {
    first: Selector,
    regular: Selector,
    author_linked: Selector,
    author_plain: Selector,
    date: Selector,
    body: Selector,
    reply: Selector,
}

static POST: LazyLock<PostSelectors> = LazyLock::new(|| PostSelectors {
    first: selector("div.row.firstpost.topPost"),
    regular: selector("div.row.topPost:not(.firstpost)"),
    author_linked: selector("div.author a h4"),
    author_plain: selector("div.author h4"),
    date: selector("div.calendar"),
    body: selector("div.col-md-9"),
    reply: selector("div[class^='reply']"),
});

/// Subtrees never part of a post's text.
const NON_CONTENT_TAGS: &[&str] = &["script", "ins", "style"];

/// Forums listed on the site index, grouped by their section heading.
#[must_use]
pub fn extract_forums(document: &Html, base_url: &Url) -> Vec<NewForum> {
    let mut forums = Vec::new();

    for group in document.select(&FORUM.group) {
        let group_name = first_text(group, &[&FORUM.group_label]);

        for row in group.select(&FORUM.row) {
            let Some(link) = row.select(&FORUM.link).next() else {
                continue;
            };
            let Some(url) = link.value().attr("href").and_then(|h| base_url.join(h).ok()) else {
                continue;
            };

            let (subjects, replies) = first_match(row, &[&FORUM.stats])
                .map(|stats| parse_forum_stats(&inline_text(stats)))
                .unwrap_or_default();

            forums.push(NewForum {
                url: url.to_string(),
                group_name: group_name.clone(),
                title: inline_text(link),
                description: first_text(row, &[&FORUM.description]),
                subjects,
                replies,
            });
        }
    }

    forums
}

/// Subject and reply counts from a stats blob such as `"111 sujets 42 réponses"`.
///
/// The first token is the subject count and the third the reply count; each
/// is independently left empty when it does not parse.
fn parse_forum_stats(text: &str) -> (Option<i64>, Option<i64>) {
    let normalized = text.replace('\u{a0}', " ");
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    let at = |i: usize| tokens.get(i).and_then(|t| parse_count(t));
    (at(0), at(2))
}

/// Threads listed on one page of a forum.
#[must_use]
pub fn extract_threads(document: &Html, base_url: &Url) -> Vec<NewThread> {
    document
        .select(&THREAD.row)
        .filter_map(|row| extract_thread_row(row, base_url))
        .collect()
}

fn extract_thread_row(row: ElementRef<'_>, base_url: &Url) -> Option<NewThread> {
    let link = row.select(&THREAD.link).next()?;
    let href = link.value().attr("href")?;
    let url = canonical_thread_url(base_url, href)?;

    let mut counts = row
        .select(&THREAD.stats)
        .next()
        .into_iter()
        .flat_map(|stats| stats.select(&THREAD.stat_value))
        .map(|strong| parse_count(&inline_text(strong)));
    let replies = counts.next().flatten();
    let views = counts.next().flatten();

    let last_post = row.select(&THREAD.last_post).next();

    Some(NewThread {
        url,
        title: inline_text(link),
        author: first_text(row, &[&THREAD.author]),
        replies,
        views,
        last_date: last_post.and_then(|lp| first_text(lp, &[&THREAD.last_date])),
        last_author: last_post.and_then(|lp| first_text(lp, &[&THREAD.last_author])),
    })
}

/// Resolve a thread link to the URL of the thread's first page.
///
/// Any fragment (`#num99`) is dropped and the page slot is forced to 1, so
/// links discovered on any page of a thread converge on one identity. Links
/// that do not carry a page slot are kept as resolved.
#[must_use]
pub fn canonical_thread_url(base_url: &Url, href: &str) -> Option<String> {
    let mut url = base_url.join(href).ok()?;
    url.set_fragment(None);
    let url = url.to_string();
    Some(PagePattern::Thread.with_page(&url, 1).unwrap_or(url))
}

/// Posts on one page of a thread: the opening post (only present on a
/// thread's first page) then the replies in document order.
///
/// Advertisement rows and posts whose text ends up empty are left out; the
/// caller numbers whatever is returned.
#[must_use]
pub fn extract_posts(document: &Html) -> Vec<NewPost> {
    document
        .select(&POST.first)
        .chain(document.select(&POST.regular))
        .filter_map(extract_post)
        .collect()
}

fn extract_post(container: ElementRef<'_>) -> Option<NewPost> {
    let author = first_text(container, &[&POST.author_linked, &POST.author_plain])
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

    let post_date = first_match(container, &[&POST.date])
        .map(|date| strip_glyphs(&inline_text(date)))
        .filter(|date| !date.is_empty());

    let content = next_row(container)
        .and_then(|row| row.select(&POST.body).next())
        .map(post_body)
        .unwrap_or_default();

    if content.is_empty() || is_advertisement(&content) {
        return None;
    }

    Some(NewPost {
        author,
        content,
        post_date,
    })
}

/// The `div.row` sibling that follows the author/date row, unless the next
/// row already belongs to another post.
fn next_row(container: ElementRef<'_>) -> Option<ElementRef<'_>> {
    container
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "div" && el.value().classes().any(|c| c == "row"))
        .filter(|row| !row.value().classes().any(|c| c == "topPost"))
}

/// A reply sub-container is taken whole; only a bare body is cleaned of
/// script and ad elements.
fn post_body(body: ElementRef<'_>) -> String {
    match body.select(&POST.reply).next() {
        Some(reply) => block_text(reply, &[]),
        None => block_text(body, NON_CONTENT_TAGS),
    }
}

fn is_advertisement(text: &str) -> bool {
    AD_MARKERS.iter().any(|marker| text.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://forum.example.com/").unwrap()
    }

    const FORUM_INDEX: &str = r#"
        <div class="containerGroup">
          <h4>General</h4>
          <div class="forum-row catLink">
            <a class="categoryLink" href="/liste-100-1-1-announcements.html">Announcements</a>
            <div class="forumdesc">News from the staff</div>
            <div class="col-md-1">111 <span>sujets</span> 42 <span>réponses</span></div>
          </div>
          <div class="forum-row catLink">
            <span>Deleted forum</span>
          </div>
          <div class="forum-row catLink">
            <a class="categoryLink" href="/liste-100-2-1-chat.html">Chat</a>
            <div class="col-md-1">n/a</div>
          </div>
        </div>
        <div class="containerGroup">
          <div class="forum-row catLink">
            <a class="categoryLink" href="/liste-100-3-1-misc.html">Misc</a>
          </div>
        </div>
    "#;

    #[test]
    fn test_extract_forums() {
        let forums = extract_forums(&Html::parse_document(FORUM_INDEX), &base());
        assert_eq!(forums.len(), 3);

        assert_eq!(forums[0].group_name.as_deref(), Some("General"));
        assert_eq!(forums[0].title, "Announcements");
        assert_eq!(forums[0].url, "http://forum.example.com/liste-100-1-1-announcements.html");
        assert_eq!(forums[0].description.as_deref(), Some("News from the staff"));
        assert_eq!(forums[0].subjects, Some(111));
        assert_eq!(forums[0].replies, Some(42));

        assert_eq!(forums[1].title, "Chat");
        assert_eq!(forums[1].description, None);
        assert_eq!(forums[1].subjects, None);
        assert_eq!(forums[1].replies, None);

        assert_eq!(forums[2].group_name, None);
        assert_eq!(forums[2].title, "Misc");
    }

    #[test]
    fn test_parse_forum_stats_is_positional() {
        assert_eq!(parse_forum_stats("12 sujets 340 réponses"), (Some(12), Some(340)));
        assert_eq!(parse_forum_stats("12\u{a0}sujets"), (Some(12), None));
        assert_eq!(parse_forum_stats("many sujets 3 réponses"), (None, Some(3)));
        assert_eq!(parse_forum_stats(""), (None, None));
    }

    const THREAD_LIST: &str = r#"
        <div class="row forum-row">
          <div class="tclcon">
            <a href="/sujet-12-34-5-2-welcome.html#num99">Welcome aboard</a>
            <a itemprop="author" href="/profil-1.html">alice</a>
          </div>
          <div itemprop="interactionStatistic"><strong>4</strong> replies <strong>120</strong> views</div>
          <div class="lastpostlink"><time>12/03/2015</time><span class="byuser">by <a href="/u/2">bob</a></span></div>
        </div>
        <div class="row forum-row">
          <div class="tclcon"><span>Moved topic</span></div>
        </div>
        <div class="row forum-row">
          <div class="tclcon"><a href="sujet-12-34-6-1-rules.html">Rules</a></div>
          <div itemprop="interactionStatistic"><strong>-</strong><strong>9</strong></div>
        </div>
    "#;

    #[test]
    fn test_extract_threads() {
        let threads = extract_threads(&Html::parse_document(THREAD_LIST), &base());
        assert_eq!(threads.len(), 2);

        let first = &threads[0];
        assert_eq!(first.url, "http://forum.example.com/sujet-12-34-5-1-welcome.html");
        assert_eq!(first.title, "Welcome aboard");
        assert_eq!(first.author.as_deref(), Some("alice"));
        assert_eq!(first.replies, Some(4));
        assert_eq!(first.views, Some(120));
        assert_eq!(first.last_date.as_deref(), Some("12/03/2015"));
        assert_eq!(first.last_author.as_deref(), Some("bob"));

        let second = &threads[1];
        assert_eq!(second.title, "Rules");
        assert_eq!(second.author, None);
        assert_eq!(second.replies, None);
        assert_eq!(second.views, Some(9));
        assert_eq!(second.last_date, None);
    }

    #[test]
    fn test_canonical_thread_url() {
        assert_eq!(
            canonical_thread_url(&base(), "sujet-12-34-5-2-title.html#num99").as_deref(),
            Some("http://forum.example.com/sujet-12-34-5-1-title.html")
        );
        assert_eq!(
            canonical_thread_url(&base(), "/viewtopic.php?t=5#p1").as_deref(),
            Some("http://forum.example.com/viewtopic.php?t=5")
        );
    }

    const THREAD_PAGE: &str = r#"
        <div class="row firstpost topPost">
          <div class="author"><a href="/u/1"><h4>alice</h4></a></div>
          <div class="calendar">&#xf073; 01/02/2015 10:00</div>
        </div>
        <div class="row">
          <div class="col-md-9">Opening post<br>with two lines<script>google_ad_client = "x";</script><ins>ad</ins></div>
        </div>
        <div class="row topPost">
          <div class="author"><h4>bob</h4></div>
          <div class="calendar">02/02/2015</div>
        </div>
        <div class="row">
          <div class="col-md-9"><div class="reply5950509">A reply</div><div class="signature">sig</div></div>
        </div>
        <div class="row topPost">
          <div class="author"><h4>sponsor</h4></div>
        </div>
        <div class="row">
          <div class="col-md-9"><div class="reply1">Liens sponsorisés : buy now</div></div>
        </div>
        <div class="row topPost">
          <div class="calendar">03/02/2015</div>
        </div>
        <div class="row">
          <div class="col-md-9"><p>Anonymous words</p></div>
        </div>
    "#;

    #[test]
    fn test_extract_posts() {
        let posts = extract_posts(&Html::parse_document(THREAD_PAGE));
        assert_eq!(posts.len(), 3);

        assert_eq!(posts[0].author, "alice");
        assert_eq!(posts[0].post_date.as_deref(), Some("01/02/2015 10:00"));
        assert_eq!(posts[0].content, "Opening post\nwith two lines");

        assert_eq!(posts[1].author, "bob");
        assert_eq!(posts[1].content, "A reply");

        assert_eq!(posts[2].author, UNKNOWN_AUTHOR);
        assert_eq!(posts[2].content, "Anonymous words");
        assert_eq!(posts[2].post_date.as_deref(), Some("03/02/2015"));
    }

    #[test]
    fn test_ad_script_inside_reply_is_dropped() {
        let html = r#"
            <div class="row topPost"><div class="author"><h4>carol</h4></div></div>
            <div class="row"><div class="col-md-9"><div class="reply3">Before the ad</div></div></div>
            <div class="row topPost"><div class="author"><h4>sponsor</h4></div></div>
            <div class="row">
              <div class="col-md-9"><div class="reply9"><script>google_ad_client = "ca-pub-1";</script>Publicite</div></div>
            </div>
            <div class="row topPost"><div class="author"><h4>dave</h4></div></div>
            <div class="row"><div class="col-md-9"><div class="reply4">After the ad</div></div></div>
        "#;
        let posts = extract_posts(&Html::parse_document(html));
        let authors: Vec<&str> = posts.iter().map(|p| p.author.as_str()).collect();
        assert_eq!(authors, ["carol", "dave"]);
    }

    #[test]
    fn test_first_post_leads_regardless_of_position() {
        let html = r#"
            <div class="row topPost"><div class="author"><h4>bob</h4></div></div>
            <div class="row"><div class="col-md-9">reply</div></div>
            <div class="row firstpost topPost"><div class="author"><h4>alice</h4></div></div>
            <div class="row"><div class="col-md-9">opening</div></div>
        "#;
        let posts = extract_posts(&Html::parse_document(html));
        let contents: Vec<&str> = posts.iter().map(|p| p.content.as_str()).collect();
        assert_eq!(contents, ["opening", "reply"]);
    }

    #[test]
    fn test_post_without_body_is_dropped() {
        let html = r#"
            <div class="row topPost"><div class="author"><h4>ghost</h4></div></div>
        "#;
        assert!(extract_posts(&Html::parse_document(html)).is_empty());
    }
}
