use std::cell::RefCell;
use std::rc::Rc;
use url::Url;

/// Attribute set on an event target while its snapshot is taken.
pub const TARGET_MARKER_ATTR: &str = "data-recording_target";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// The document the recorder runs in.
pub trait Page {
    /// Full current URL including the query string.
    fn href(&self) -> String;

    fn pathname(&self) -> String {
        Url::parse(&self.href())
            .map(|u| u.path().to_string())
            .unwrap_or_default()
    }

    fn viewport(&self) -> Viewport;

    /// Serialized markup of the whole document.
    fn outer_html(&self) -> String;
}

/// Handle on the element an event was dispatched to.
pub trait TargetMarker {
    fn set_marked(&self, marked: bool);
}

/// Page backed by a fixed markup string.
#[derive(Debug, Default)]
pub struct StaticPage {
    href: RefCell<String>,
    viewport: Viewport,
    markup: Rc<RefCell<String>>,
}

impl StaticPage {
    pub fn new(href: impl Into<String>, viewport: Viewport, markup: impl Into<String>) -> Self {
        Self {
            href: RefCell::new(href.into()),
            viewport,
            markup: Rc::new(RefCell::new(markup.into())),
        }
    }

    /// Simulate a navigation: the next page load sees a new URL and document.
    pub fn load(&self, href: impl Into<String>, markup: impl Into<String>) {
        *self.href.borrow_mut() = href.into();
        *self.markup.borrow_mut() = markup.into();
    }

    pub fn set_href(&self, href: impl Into<String>) {
        *self.href.borrow_mut() = href.into();
    }

    /// Marker for the element carrying `id="<id>"` in the fixture.
    pub fn target(&self, id: &str) -> Rc<dyn TargetMarker> {
        Rc::new(StaticTarget {
            markup: Rc::clone(&self.markup),
            id: id.to_string(),
        })
    }
}

impl Page for StaticPage {
    fn href(&self) -> String {
        self.href.borrow().clone()
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn outer_html(&self) -> String {
        self.markup.borrow().clone()
    }
}

struct StaticTarget {
    markup: Rc<RefCell<String>>,
    id: String,
}

impl TargetMarker for StaticTarget {
    fn set_marked(&self, marked: bool) {
        let plain = format!("id=\"{}\"", self.id);
        let tagged = format!("{} {}=\"true\"", plain, TARGET_MARKER_ATTR);
        let mut markup = self.markup.borrow_mut();
        *markup = if marked {
            markup.replacen(&plain, &tagged, 1)
        } else {
            markup.replacen(&tagged, &plain, 1)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pathname_comes_from_href() {
        let page = StaticPage::new(
            "http://localhost:8080/wavsep/login.jsp?record=true",
            Viewport::new(800, 600),
            "<html></html>",
        );
        assert_eq!(page.pathname(), "/wavsep/login.jsp");
    }

    #[test]
    fn target_marker_toggles_attribute() {
        let page = StaticPage::new("http://h/", Viewport::default(), r#"<button id="go">Go</button>"#);
        let target = page.target("go");

        target.set_marked(true);
        assert!(page.outer_html().contains(r#"id="go" data-recording_target="true""#));

        target.set_marked(false);
        assert_eq!(page.outer_html(), r#"<button id="go">Go</button>"#);
    }
}
