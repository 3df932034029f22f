use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use scraper::{Html, Selector};

use eqtrend_core::latex::strip_display;
use eqtrend_core::{EqError, EqResult, Equation, Origin};

use crate::{agent, http_error};

/// Link targets under these prefixes are not articles.
const NAMESPACES: &[&str] = &[
    "Category", "File", "Help", "Image", "Portal", "Special", "Talk", "Template",
    "Template_talk", "User", "User_talk", "Wikipedia", "Wikipedia_talk", "MediaWiki",
    "Module", "Draft",
];

/// Last path segment of a page URL, fragment and query dropped.
pub fn page_name(url: &str) -> &str {
    let url = url.split(['#', '?']).next().unwrap_or(url);
    url.trim_end_matches('/').rsplit('/').next().unwrap_or(url)
}

/// Directory of downloaded pages, one `<page>.html` file per URL.
#[derive(Debug, Clone)]
pub struct PageCache {
    dir: PathBuf,
}

impl PageCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, url: &str) -> PathBuf {
        self.dir.join(format!("{}.html", page_name(url)))
    }

    pub fn contains(&self, url: &str) -> bool {
        self.path_for(url).is_file()
    }

    /// Every cached page as `(page name, path)`, sorted by name.
    pub fn pages(&self) -> EqResult<Vec<(String, PathBuf)>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut pages = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "html") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    pages.push((stem.to_string(), path.clone()));
                }
            }
        }
        pages.sort();
        Ok(pages)
    }
}

pub struct WikiClient {
    agent: ureq::Agent,
    base_url: String,
    cache: PageCache,
}

impl WikiClient {
    pub fn new(base_url: &str, cache: PageCache, user_agent: &str, timeout: Duration) -> Self {
        Self {
            agent: agent(user_agent, timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
            cache,
        }
    }

    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    /// Fetch a page into the cache unless it is already there.
    pub fn download(&self, url: &str) -> EqResult<PathBuf> {
        let path = self.cache.path_for(url);
        if path.is_file() {
            tracing::debug!(url, "cached");
            return Ok(path);
        }
        tracing::debug!(url, "downloading");
        let body = self
            .agent
            .get(url)
            .call()
            .map_err(http_error)?
            .into_string()?;
        std::fs::create_dir_all(self.cache.dir())?;
        std::fs::write(&path, body)?;
        Ok(path)
    }

    /// Download a list page and up to `max_pages` of the articles it links
    /// to. Returns the cached paths, list page first. Articles that fail to
    /// download are logged and left out.
    pub fn crawl_list_page(&self, url: &str, max_pages: usize) -> EqResult<Vec<PathBuf>> {
        let list = self.download(url)?;
        let html = std::fs::read_to_string(&list)?;
        let links = extract_links(&html, &self.base_url);
        tracing::info!(url, links = links.len(), "found links on list page");

        let mut paths = vec![list];
        for link in links.iter().take(max_pages) {
            match self.download(link) {
                Ok(p) => paths.push(p),
                Err(e) => tracing::warn!(url = %link, error = %e, "download failed, skipped"),
            }
        }
        Ok(paths)
    }
}

fn selector(css: &str) -> EqResult<Selector> {
    Selector::parse(css).map_err(|e| EqError::Parse(format!("bad selector {css}: {e}")))
}

/// Article links of a page, absolute, in order of first appearance.
pub fn extract_links(html: &str, base_url: &str) -> Vec<String> {
    let Ok(anchors) = selector("a[href]") else {
        return Vec::new();
    };
    let base = base_url.trim_end_matches('/');
    let doc = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for a in doc.select(&anchors) {
        let Some(href) = a.value().attr("href") else {
            continue;
        };
        let Some(target) = href.strip_prefix("/wiki/") else {
            continue;
        };
        let target = target.split('#').next().unwrap_or_default();
        if target.is_empty() || target == "Main_Page" {
            continue;
        }
        if let Some((ns, _)) = target.split_once(':') {
            if NAMESPACES.contains(&ns) {
                continue;
            }
        }
        if seen.insert(target.to_string()) {
            out.push(format!("{base}/wiki/{target}"));
        }
    }
    out
}

/// TeX sources of every formula on a page, `{\displaystyle …}` removed.
pub fn extract_equations(html: &str) -> Vec<String> {
    let Ok(annotations) = selector("annotation") else {
        return Vec::new();
    };
    let doc = Html::parse_document(html);
    doc.select(&annotations)
        .filter(|el| {
            el.value()
                .attr("encoding")
                .map_or(true, |enc| enc == "application/x-tex")
        })
        .map(|el| strip_display(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Human-readable title of a page name: `Ohm%27s_law` is `Ohm's law`.
/// A name that does not decode to UTF-8 is kept as it is.
pub fn page_title(page: &str) -> String {
    let decoded = urlencoding::decode(page).unwrap_or_else(|_| page.into());
    decoded.replace('_', " ")
}

/// Equations of one page. A formula repeated on the page is kept once.
pub fn equations_from_page(url: &str, html: &str) -> Vec<Equation> {
    let page = page_name(url);
    let title = page_title(page);
    let mut seen = HashSet::new();
    extract_equations(html)
        .into_iter()
        .filter(|latex| seen.insert(latex.clone()))
        .map(|latex| {
            let mut eq = Equation::new(
                Origin::Wikipedia {
                    page: page.to_string(),
                },
                Some(latex),
            );
            eq.label = Some(title.clone());
            eq
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST_PAGE: &str = r##"<html><body>
      <a href="/wiki/Ohm%27s_law">Ohm's law</a>
      <a href="/wiki/Bernoulli%27s_principle#Incompressible_flow">Bernoulli</a>
      <a href="/wiki/Ohm%27s_law">again</a>
      <a href="/wiki/Category:Equations">category</a>
      <a href="/wiki/File:Plot.svg">file</a>
      <a href="/wiki/Main_Page">home</a>
      <a href="#cite_note-1">note</a>
      <a href="https://example.org/wiki/Other">external</a>
      <a href="/wiki/Ratio:_a_study">colon in title</a>
    </body></html>"##;

    const ARTICLE: &str = r#"<html><body><p>
      <span class="mwe-math-element"><math xmlns="http://www.w3.org/1998/Math/MathML" alttext="{\displaystyle V=IR}">
        <semantics><mrow><mi>V</mi><mo>=</mo><mi>I</mi><mi>R</mi></mrow>
        <annotation encoding="application/x-tex">{\displaystyle V=IR}</annotation></semantics></math></span>
      <math><semantics><mi>I</mi><annotation encoding="application/x-tex">{\displaystyle I}</annotation></semantics></math>
      <math><semantics><mi>x</mi><annotation encoding="application/x-tex">{\displaystyle V=IR}</annotation></semantics></math>
      <math><semantics><mi>z</mi><annotation encoding="application/x-tex">{\displaystyle }</annotation></semantics></math>
    </p></body></html>"#;

    #[test]
    fn test_page_name() {
        assert_eq!(page_name("https://en.wikipedia.org/wiki/List_of_equations"), "List_of_equations");
        assert_eq!(page_name("https://en.wikipedia.org/wiki/Ohm%27s_law#History"), "Ohm%27s_law");
        assert_eq!(page_name("https://en.wikipedia.org/wiki/Foo/"), "Foo");
    }

    #[test]
    fn test_path_for() {
        let cache = PageCache::new("/tmp/content");
        assert_eq!(
            cache.path_for("https://en.wikipedia.org/wiki/List_of_equations"),
            PathBuf::from("/tmp/content/List_of_equations.html")
        );
    }

    #[test]
    fn test_extract_links() {
        let links = extract_links(LIST_PAGE, "https://en.wikipedia.org/");
        assert_eq!(
            links,
            vec![
                "https://en.wikipedia.org/wiki/Ohm%27s_law",
                "https://en.wikipedia.org/wiki/Bernoulli%27s_principle",
                "https://en.wikipedia.org/wiki/Ratio:_a_study",
            ]
        );
    }

    #[test]
    fn test_extract_equations() {
        let eqs = extract_equations(ARTICLE);
        assert_eq!(eqs, vec!["V=IR", "I", "V=IR"]);
        assert!(extract_equations("<p>no math here</p>").is_empty());
    }

    #[test]
    fn test_equations_from_page() {
        let eqs = equations_from_page("https://en.wikipedia.org/wiki/Ohm%27s_law", ARTICLE);
        assert_eq!(eqs.len(), 2);
        assert_eq!(eqs[0].origin, Origin::Wikipedia { page: "Ohm%27s_law".into() });
        assert_eq!(eqs[0].latex.as_deref(), Some("V=IR"));
        assert_eq!(eqs[0].label.as_deref(), Some("Ohm's law"));
        assert!(eqs[0].birth.is_none());
        assert_ne!(eqs[0].id, eqs[1].id);
    }

    #[test]
    fn test_cached_page_is_not_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PageCache::new(dir.path());
        let url = "http://127.0.0.1:9/wiki/Cached";
        std::fs::write(cache.path_for(url), "<html></html>").unwrap();

        // port 9 is discard; a real request would fail
        let client = WikiClient::new("http://127.0.0.1:9", cache, "eqtrend-test", Duration::from_secs(1));
        let path = client.download(url).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "<html></html>");
    }

    #[test]
    fn test_cache_pages() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PageCache::new(dir.path().join("content"));
        assert!(cache.pages().unwrap().is_empty());

        std::fs::create_dir_all(cache.dir()).unwrap();
        std::fs::write(cache.dir().join("B.html"), "").unwrap();
        std::fs::write(cache.dir().join("A.html"), "").unwrap();
        std::fs::write(cache.dir().join("notes.txt"), "").unwrap();

        let names: Vec<String> = cache.pages().unwrap().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_page_title_decodes() {
        assert_eq!(page_title("Ohm%27s_law"), "Ohm's law");
        assert_eq!(page_title("Schr%C3%B6dinger_equation"), "Schrödinger equation");
        assert_eq!(page_title("Maxwell's_equations"), "Maxwell's equations");
        // not UTF-8 once decoded
        assert_eq!(page_title("Bad%FF_name"), "Bad%FF name");
    }
}
