use serde::Serialize;
use serde_yaml::{Mapping, Value};

/// Keys that hold a document's structured tag list
const TAG_KEYS: &[&str] = &["tags", "tag"];

/// Keys that hold a document's alias list
const ALIAS_KEYS: &[&str] = &["aliases", "alias"];

/// Value of a tag or alias field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// `tags: [a, b]` or a block sequence
    List(Vec<String>),
    /// `tags: a, b c` as a single string
    Text(String),
}

impl FieldValue {
    /// Entries as written, without splitting delimited text
    pub fn entries(&self) -> Vec<&str> {
        match self {
            FieldValue::List(items) => items.iter().map(|s| s.as_str()).collect(),
            FieldValue::Text(s) => vec![s.as_str()],
        }
    }

    /// YAML for this value, reusing `original` wherever an entry still reads
    /// the same so untouched numbers and bools keep their type.
    fn to_yaml(&self, original: Option<&Value>) -> Value {
        match (self, original) {
            (FieldValue::List(items), Some(Value::Sequence(seq))) if seq.len() == items.len() => {
                Value::Sequence(
                    items
                        .iter()
                        .zip(seq)
                        .map(|(item, before)| keep_or_replace(item, before))
                        .collect(),
                )
            }
            (FieldValue::List(items), _) => {
                Value::Sequence(items.iter().map(|s| Value::String(s.clone())).collect())
            }
            (FieldValue::Text(s), Some(before)) => keep_or_replace(s, before),
            (FieldValue::Text(s), None) => Value::String(s.clone()),
        }
    }

    fn from_yaml(value: &Value) -> Option<FieldValue> {
        match value {
            Value::Sequence(seq) => {
                let mut items = Vec::with_capacity(seq.len());
                for item in seq {
                    items.push(scalar_to_string(item)?);
                }
                Some(FieldValue::List(items))
            }
            Value::Null => None,
            other => scalar_to_string(other).map(FieldValue::Text),
        }
    }
}

fn keep_or_replace(item: &str, before: &Value) -> Value {
    if scalar_to_string(before).as_deref() == Some(item) {
        before.clone()
    } else {
        Value::String(item.to_string())
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A parsed YAML front-matter block.
#[derive(Debug, Clone)]
pub struct FrontMatter {
    /// The whole block as it appeared, delimiters and trailing newline included
    block: String,
    /// Parsed mapping, `None` if the YAML was not a valid mapping
    mapping: Option<Mapping>,
}

impl FrontMatter {
    /// Original text of the block
    pub fn as_str(&self) -> &str {
        &self.block
    }

    pub fn tags(&self) -> Option<FieldValue> {
        self.field(TAG_KEYS)
    }

    pub fn aliases(&self) -> Option<FieldValue> {
        self.field(ALIAS_KEYS)
    }

    fn field(&self, names: &[&str]) -> Option<FieldValue> {
        let mapping = self.mapping.as_ref()?;
        let key = find_key(mapping, names)?;
        FieldValue::from_yaml(mapping.get(&key)?)
    }

    /// Render the block with the given tag and alias fields. Returns the
    /// original text untouched when both fields are unchanged.
    pub fn render_with(&self, tags: Option<&FieldValue>, aliases: Option<&FieldValue>) -> String {
        let Some(mapping) = &self.mapping else {
            return self.block.clone();
        };
        if self.tags().as_ref() == tags && self.aliases().as_ref() == aliases {
            return self.block.clone();
        }

        let mut mapping = mapping.clone();
        if let Some(value) = tags {
            set_field(&mut mapping, TAG_KEYS, value);
        }
        if let Some(value) = aliases {
            set_field(&mut mapping, ALIAS_KEYS, value);
        }
        match serde_yaml::to_string(&Value::Mapping(mapping)) {
            Ok(yaml) => format!("---\n{}---\n", yaml),
            Err(e) => {
                tracing::warn!("could not serialize front matter, keeping original: {}", e);
                self.block.clone()
            }
        }
    }
}

fn find_key(mapping: &Mapping, names: &[&str]) -> Option<Value> {
    mapping
        .keys()
        .find(|k| {
            k.as_str()
                .is_some_and(|s| names.iter().any(|n| s.eq_ignore_ascii_case(n)))
        })
        .cloned()
}

fn set_field(mapping: &mut Mapping, names: &[&str], value: &FieldValue) {
    let key = find_key(mapping, names).unwrap_or_else(|| Value::String(names[0].to_string()));
    let yaml = value.to_yaml(mapping.get(&key));
    mapping.insert(key, yaml);
}

/// Split a document into its front-matter block (if any) and body.
///
/// The block must open on the first line with `---` and close with a line
/// that is exactly `---` or `...`.
pub fn split_front_matter(text: &str) -> (Option<FrontMatter>, &str) {
    let Some(first_end) = text.find('\n') else {
        return (None, text);
    };
    if text[..first_end].trim_end_matches('\r') != "---" {
        return (None, text);
    }

    let mut offset = first_end + 1;
    while offset <= text.len() {
        let rest = &text[offset..];
        let (line, next) = match rest.find('\n') {
            Some(i) => (&rest[..i], offset + i + 1),
            None => (rest, text.len()),
        };
        let line = line.trim_end_matches('\r');
        if line == "---" || line == "..." {
            let yaml = &text[first_end + 1..offset];
            let mapping = match serde_yaml::from_str::<Value>(yaml) {
                Ok(Value::Mapping(m)) => Some(m),
                Ok(Value::Null) => Some(Mapping::new()),
                Ok(_) => None,
                Err(e) => {
                    tracing::debug!("front matter is not valid YAML: {}", e);
                    None
                }
            };
            let front = FrontMatter {
                block: text[..next].to_string(),
                mapping,
            };
            return (Some(front), &text[next..]);
        }
        if next == text.len() {
            break;
        }
        offset = next;
    }
    (None, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_without_front_matter() {
        let (fm, body) = split_front_matter("# Title\n\nbody #tag\n");
        assert!(fm.is_none());
        assert_eq!(body, "# Title\n\nbody #tag\n");
    }

    #[test]
    fn test_split_with_front_matter() {
        let text = "---\ntags: [a, b]\n---\nbody\n";
        let (fm, body) = split_front_matter(text);
        let fm = fm.unwrap();
        assert_eq!(fm.as_str(), "---\ntags: [a, b]\n---\n");
        assert_eq!(body, "body\n");
        assert_eq!(
            fm.tags(),
            Some(FieldValue::List(vec!["a".to_string(), "b".to_string()]))
        );
        assert_eq!(fm.aliases(), None);
    }

    #[test]
    fn test_split_unclosed_is_body() {
        let text = "---\ntags: a\nno closing\n";
        let (fm, body) = split_front_matter(text);
        assert!(fm.is_none());
        assert_eq!(body, text);
    }

    #[test]
    fn test_split_closing_at_end_of_file() {
        let (fm, body) = split_front_matter("---\nalias: x\n...");
        assert_eq!(fm.unwrap().aliases(), Some(FieldValue::Text("x".to_string())));
        assert_eq!(body, "");
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let (fm, _) = split_front_matter("---\nTags: one, two\nAliases:\n  - \"#x\"\n---\n");
        let fm = fm.unwrap();
        assert_eq!(fm.tags(), Some(FieldValue::Text("one, two".to_string())));
        assert_eq!(fm.aliases(), Some(FieldValue::List(vec!["#x".to_string()])));
    }

    #[test]
    fn test_invalid_yaml_is_opaque() {
        let text = "---\ntags: [unclosed\n---\nbody";
        let (fm, body) = split_front_matter(text);
        let fm = fm.unwrap();
        assert_eq!(fm.tags(), None);
        assert_eq!(fm.render_with(Some(&FieldValue::Text("x".into())), None), fm.as_str());
        assert_eq!(body, "body");
    }

    #[test]
    fn test_render_unchanged_is_verbatim() {
        let text = "---\n# comment survives\ntags:   [a,b]\ntitle: T\n---\n";
        let (fm, _) = split_front_matter(text);
        let fm = fm.unwrap();
        let tags = fm.tags();
        assert_eq!(fm.render_with(tags.as_ref(), None), text);
    }

    #[test]
    fn test_render_changed_keeps_key_order() {
        let text = "---\ntitle: T\nTags:\n- a\n- b\nother: 1\n---\n";
        let (fm, _) = split_front_matter(text);
        let fm = fm.unwrap();
        let new_tags = FieldValue::List(vec!["c".to_string(), "b".to_string()]);
        let rendered = fm.render_with(Some(&new_tags), None);
        assert_eq!(rendered, "---\ntitle: T\nTags:\n- c\n- b\nother: 1\n---\n");
    }

    #[test]
    fn test_numeric_entries_read_as_strings() {
        let (fm, _) = split_front_matter("---\ntags: [2024, draft]\n---\n");
        assert_eq!(
            fm.unwrap().tags(),
            Some(FieldValue::List(vec!["2024".to_string(), "draft".to_string()]))
        );
    }

    #[test]
    fn test_render_keeps_untouched_entry_types() {
        let text = "---\ntags: [2024, proj, true]\naliases: 7\n---\n";
        let (fm, _) = split_front_matter(text);
        let fm = fm.unwrap();
        let new_tags = FieldValue::List(vec!["2024".into(), "work".into(), "true".into()]);
        let rendered = fm.render_with(Some(&new_tags), fm.aliases().as_ref());
        assert_eq!(rendered, "---\ntags:\n- 2024\n- work\n- true\naliases: 7\n---\n");
    }
}
