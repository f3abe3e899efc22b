use askama::Template;
use ct_core::models::{Block, Setting, ThemeSolution};

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate<'a> {
    pub blocks: &'a [Block],
    pub theme: ThemeSolution,
    pub edit: bool,
    pub title: &'a str,
}

impl<'a> DashboardTemplate<'a> {
    pub fn new(setting: Option<&'a Setting>, edit: bool) -> Self {
        Self {
            blocks: setting.map_or(&[][..], |s| s.links.as_slice()),
            theme: setting.map(|s| s.theme.solution).unwrap_or_default(),
            edit,
            title: "New Tab",
        }
    }

    /// Nothing to show yet; the page offers to create the first block.
    pub fn is_first_run(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn theme_class(&self) -> &'static str {
        self.theme.as_str()
    }

    pub fn theme_selected(&self, name: &str) -> bool {
        self.theme.as_str() == name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ct_core::models::{Link, LinkStyle, MenuItem, ThemeSetting};

    fn setting() -> Setting {
        let mut block = Block::new("b1".into(), "Work", Setting::default().next_block_layout("b1", None));
        let mut mail = Link::new("Mail", "https://mail.example.com");
        mail.style = LinkStyle::Color("#222222".into());
        mail.description = Some("inbox".into());
        let mut docs = Link::new("Docs", "");
        docs.menu = Some(vec![MenuItem {
            id: "m1".into(),
            title: "Rust".into(),
            url: "https://doc.rust-lang.org".into(),
        }]);
        block.buttons = vec![mail, docs];

        Setting {
            theme: ThemeSetting {
                solution: ThemeSolution::Dark,
            },
            links: vec![block],
            ..Setting::default()
        }
    }

    #[test]
    fn test_first_run_offers_first_block() {
        let html = DashboardTemplate::new(None, false).render().unwrap();
        assert!(html.contains("Create first block"));
        assert!(html.contains("theme-default"));
    }

    #[test]
    fn test_renders_blocks_and_links() {
        let setting = setting();
        let html = DashboardTemplate::new(Some(&setting), false).render().unwrap();

        assert!(html.contains("theme-dark"));
        assert!(html.contains("Work"));
        assert!(html.contains("mail.example.com"));
        assert!(html.contains("background-color: #222222; color: #fff"));
        assert!(html.contains("title=\"inbox\""));
        assert!(html.contains("doc.rust-lang.org"));
        assert!(!html.contains("Create first block"));
        assert!(!html.contains("class=\"grid\" data-edit"));
    }

    #[test]
    fn test_edit_mode_shows_controls() {
        let setting = setting();
        let html = DashboardTemplate::new(Some(&setting), true).render().unwrap();
        assert!(html.contains("class=\"grid\" data-edit"));
        assert!(html.contains("data-add-block-after=\"b1\""));
        assert!(html.contains("data-move-block=\"b1\""));
        assert!(html.contains("data-edit-link="));
        assert!(html.contains("data-style=\"#222222\""));
        assert!(html.contains("<form class=\"d-flex gap-1\" data-sync-form>"));
    }

    #[test]
    fn test_toolbar_offers_theme_and_transfer() {
        let setting = setting();
        let html = DashboardTemplate::new(Some(&setting), false).render().unwrap();
        assert!(html.contains("<select class=\"form-select form-select-sm w-auto\" data-theme>"));
        assert!(html.contains("<option value=\"dark\" selected>"));
        assert!(!html.contains("<option value=\"light\" selected>"));
        assert!(html.contains("download data-export>Export</a>"));
        assert!(html.contains("hidden data-import>"));
        assert!(html.contains("data-sync-status></small>"));
        assert!(!html.contains("data-sync-form>"));

        // importing is possible before the first block exists
        let html = DashboardTemplate::new(None, false).render().unwrap();
        assert!(html.contains("hidden data-import>"));
        assert!(html.contains("<option value=\"default\" selected>"));
    }

    #[test]
    fn test_layout_at_grid_limit_renders() {
        let mut setting = setting();
        setting.links[0].layout.x = u32::MAX;
        setting.links[0].layout.y = u32::MAX;
        let html = DashboardTemplate::new(Some(&setting), false).render().unwrap();
        assert!(html.contains(&format!("grid-row: {} / span 8", u32::MAX)));
    }
}
