//! 表单控件模型：整体禁用/启用，并保留加锁前已禁用的字段。

use tracing::debug;

/// 锁定期间替换删除链接的地址。
pub const LOCKED_HREF: &str = "#page-locked";

/// 第三方组件（富文本编辑器、多选框等），只暴露启用/禁用。
pub trait Widget: Send {
    fn name(&self) -> &str;
    fn set_enabled(&mut self, enabled: bool);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub disabled: bool,
    initially_disabled: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, disabled: bool) -> Self {
        Self {
            name: name.into(),
            disabled,
            initially_disabled: false,
        }
    }

    /// 解析 `name` 或 `name:disabled` 形式的字段描述。
    pub fn parse(spec: &str) -> Option<Self> {
        let (name, flag) = match spec.split_once(':') {
            Some((name, flag)) => (name.trim(), Some(flag.trim())),
            None => (spec.trim(), None),
        };
        if name.is_empty() {
            return None;
        }
        match flag {
            None => Some(Self::new(name, false)),
            Some(flag) if flag.eq_ignore_ascii_case("disabled") => Some(Self::new(name, true)),
            Some(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteLink {
    pub href: String,
    saved_href: Option<String>,
}

impl DeleteLink {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            saved_href: None,
        }
    }
}

#[derive(Default)]
pub struct FormControls {
    fields: Vec<Field>,
    delete_links: Vec<DeleteLink>,
    widgets: Vec<Box<dyn Widget>>,
    engaged: bool,
}

impl FormControls {
    pub fn new(fields: Vec<Field>) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    pub fn with_delete_link(mut self, link: DeleteLink) -> Self {
        self.delete_links.push(link);
        self
    }

    pub fn with_widget(mut self, widget: Box<dyn Widget>) -> Self {
        self.widgets.push(widget);
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn delete_links(&self) -> &[DeleteLink] {
        &self.delete_links
    }

    pub fn is_disabled(&self) -> bool {
        self.engaged
    }

    /// 禁用全部控件；首次禁用时记录原本已禁用的字段。
    pub fn disable(&mut self) {
        if !self.engaged {
            for field in &mut self.fields {
                if field.disabled {
                    field.initially_disabled = true;
                }
            }
            for link in &mut self.delete_links {
                link.saved_href = Some(std::mem::replace(&mut link.href, LOCKED_HREF.into()));
            }
        }
        for field in &mut self.fields {
            field.disabled = true;
        }
        for widget in &mut self.widgets {
            debug!(widget = widget.name(), "disabling widget");
            widget.set_enabled(false);
        }
        self.engaged = true;
    }

    /// 启用除原本已禁用字段之外的全部控件。
    pub fn enable(&mut self) {
        for field in &mut self.fields {
            if !field.initially_disabled {
                field.disabled = false;
            }
        }
        for link in &mut self.delete_links {
            if let Some(href) = link.saved_href.take() {
                link.href = href;
            }
        }
        for widget in &mut self.widgets {
            debug!(widget = widget.name(), "enabling widget");
            widget.set_enabled(true);
        }
        self.engaged = false;
    }
}

#[cfg(test)]
mod tests {
    use super::{DeleteLink, Field, FormControls, LOCKED_HREF, Widget};
    use std::sync::{Arc, Mutex};

    struct Editor {
        enabled: Arc<Mutex<Vec<bool>>>,
    }

    impl Widget for Editor {
        fn name(&self) -> &str {
            "body"
        }

        fn set_enabled(&mut self, enabled: bool) {
            self.enabled.lock().expect("editor log").push(enabled);
        }
    }

    fn form() -> FormControls {
        FormControls::new(vec![
            Field::new("title", false),
            Field::new("slug", true),
            Field::new("body", false),
        ])
        .with_delete_link(DeleteLink::new("/admin/news/story/3/delete/"))
    }

    fn disabled_names(form: &FormControls) -> Vec<&str> {
        form.fields()
            .iter()
            .filter(|field| field.disabled)
            .map(|field| field.name.as_str())
            .collect()
    }

    #[test]
    fn enable_preserves_initially_disabled_fields() {
        let mut form = form();
        form.disable();
        assert_eq!(disabled_names(&form), vec!["title", "slug", "body"]);
        form.enable();
        assert_eq!(disabled_names(&form), vec!["slug"]);
    }

    #[test]
    fn repeated_disable_does_not_capture_own_state() {
        let mut form = form();
        form.disable();
        form.disable();
        form.enable();
        assert_eq!(disabled_names(&form), vec!["slug"]);
        form.disable();
        form.enable();
        assert_eq!(disabled_names(&form), vec!["slug"]);
    }

    #[test]
    fn delete_links_are_neutralised_and_restored() {
        let mut form = form();
        form.disable();
        assert_eq!(form.delete_links()[0].href, LOCKED_HREF);
        form.disable();
        form.enable();
        assert_eq!(form.delete_links()[0].href, "/admin/news/story/3/delete/");
    }

    #[test]
    fn widgets_follow_the_form() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut form = form().with_widget(Box::new(Editor {
            enabled: log.clone(),
        }));
        form.disable();
        form.enable();
        assert_eq!(*log.lock().expect("editor log"), vec![false, true]);
        assert!(!form.is_disabled());
    }

    #[test]
    fn parse_field_specs() {
        assert_eq!(Field::parse("title"), Some(Field::new("title", false)));
        assert_eq!(Field::parse("slug:disabled"), Some(Field::new("slug", true)));
        assert_eq!(Field::parse("slug:readonly"), None);
        assert_eq!(Field::parse(" :disabled"), None);
    }
}
