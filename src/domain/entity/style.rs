use serde_json::Value;
use uuid::Uuid;

use super::{impl_entity, state_ref, EntityData};

/// Per layout caption configurations, each a free-form JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleLayouts {
    pub matt: Value,
    pub three_lines: Value,
    pub two_lines: Value,
    pub one_line: Value,
    pub spotlight: Value,
    pub split_screen: Value,
    pub minimal: Value,
    pub dynamic: Value,
}

impl StyleLayouts {
    pub fn empty() -> Self {
        let empty = || Value::Object(Default::default());
        Self {
            matt: empty(),
            three_lines: empty(),
            two_lines: empty(),
            one_line: empty(),
            spotlight: empty(),
            split_screen: empty(),
            minimal: empty(),
            dynamic: empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StyleState {
    pub(in crate::domain) name: String,
    pub(in crate::domain) description: Option<String>,
    pub(in crate::domain) layouts: StyleLayouts,
    pub(in crate::domain) styled_transcript: Option<Value>,
    pub(in crate::domain) creator_id: Option<Uuid>,
    pub(in crate::domain) is_default: bool,
}

#[derive(Debug, Clone)]
pub struct Style {
    pub(in crate::domain) data: EntityData,
    pub(in crate::domain) state: StyleState,
}

impl_entity!(Style, StyleState);

#[derive(Debug, Clone, Default)]
pub struct StylePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub matt: Option<Value>,
    pub three_lines: Option<Value>,
    pub two_lines: Option<Value>,
    pub one_line: Option<Value>,
    pub spotlight: Option<Value>,
    pub split_screen: Option<Value>,
    pub minimal: Option<Value>,
    pub dynamic: Option<Value>,
}

impl Style {
    state_ref!(name, String);
    state_ref!(description, Option<String>);
    state_ref!(layouts, StyleLayouts);
    state_ref!(styled_transcript, Option<Value>);

    pub fn creator_id(&self) -> Option<Uuid> {
        self.state.creator_id
    }

    pub fn is_default(&self) -> bool {
        self.state.is_default
    }

    /// A style without a creator is a system default.
    pub fn new(
        name: String,
        description: Option<String>,
        layouts: StyleLayouts,
        styled_transcript: Option<Value>,
        creator_id: Option<Uuid>,
    ) -> Self {
        Self::restore(
            EntityData::new(),
            StyleState {
                name,
                description,
                layouts,
                styled_transcript,
                is_default: creator_id.is_none(),
                creator_id,
            },
        )
    }

    /// Style holding a caption timeline generated for one of the creator's videos.
    pub fn generated(
        style_name: String,
        video_id: Uuid,
        timeline: Value,
        creator_id: Uuid,
    ) -> Self {
        Self::new(
            style_name,
            Some(format!("Generated captions for video {video_id}")),
            StyleLayouts::empty(),
            Some(timeline),
            Some(creator_id),
        )
    }

    pub fn is_created_by(&self, user_id: Uuid) -> bool {
        self.state.creator_id == Some(user_id)
    }

    pub fn apply(&mut self, patch: StylePatch) {
        let state = &mut self.state;
        if let Some(name) = patch.name {
            state.name = name;
        }
        if let Some(description) = patch.description {
            state.description = Some(description);
        }

        let layouts = &mut state.layouts;
        for (slot, value) in [
            (&mut layouts.matt, patch.matt),
            (&mut layouts.three_lines, patch.three_lines),
            (&mut layouts.two_lines, patch.two_lines),
            (&mut layouts.one_line, patch.one_line),
            (&mut layouts.spotlight, patch.spotlight),
            (&mut layouts.split_screen, patch.split_screen),
            (&mut layouts.minimal, patch.minimal),
            (&mut layouts.dynamic, patch.dynamic),
        ] {
            if let Some(value) = value {
                *slot = value;
            }
        }
        self.data.touch();
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn default_when_created_without_creator() {
        let system = Style::new("Bold".into(), None, StyleLayouts::empty(), None, None);
        assert!(system.is_default());

        let owner = Uuid::new_v4();
        let custom = Style::new("Mine".into(), None, StyleLayouts::empty(), None, Some(owner));
        assert!(!custom.is_default());
        assert!(custom.is_created_by(owner));
    }

    #[test]
    fn generated_style_describes_its_video() {
        let video_id = Uuid::new_v4();
        let style = Style::generated("matt".into(), video_id, json!([]), Uuid::new_v4());

        assert_eq!(
            style.description().as_deref(),
            Some(format!("Generated captions for video {video_id}").as_str())
        );
        assert_eq!(style.styled_transcript(), &Some(json!([])));
    }

    #[test]
    fn partial_update() {
        let mut style = Style::new("Old".into(), Some("desc".into()), StyleLayouts::empty(), None, None);
        style.apply(StylePatch {
            name: Some("New".into()),
            minimal: Some(json!({"font": "Inter"})),
            ..Default::default()
        });

        assert_eq!(style.name(), "New");
        assert_eq!(style.description().as_deref(), Some("desc"));
        assert_eq!(style.layouts().minimal, json!({"font": "Inter"}));
        assert_eq!(style.layouts().matt, json!({}));
    }
}
