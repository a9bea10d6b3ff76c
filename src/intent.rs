//! Activity-intent argument encoding for `am start` / `am broadcast`.

/// A typed intent extra.
///
/// Each kind maps to one `--e*` flag pair; arrays comma-join their values
/// behind the `a`-suffixed flag.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtraValue {
    Str(String),
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Uri(String),
    Component(String),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
    FloatArray(Vec<f32>),
    StrArray(Vec<String>),
}

impl ExtraValue {
    fn flag(&self) -> &'static str {
        match self {
            ExtraValue::Str(_) => "--es",
            ExtraValue::Null => "--esn",
            ExtraValue::Bool(_) => "--ez",
            ExtraValue::Int(_) => "--ei",
            ExtraValue::Long(_) => "--el",
            ExtraValue::Float(_) => "--ef",
            ExtraValue::Uri(_) => "--eu",
            ExtraValue::Component(_) => "--ecn",
            ExtraValue::IntArray(_) => "--eia",
            ExtraValue::LongArray(_) => "--ela",
            ExtraValue::FloatArray(_) => "--efa",
            ExtraValue::StrArray(_) => "--esa",
        }
    }

    fn value_string(&self) -> Option<String> {
        fn join<T: ToString>(values: &[T]) -> String {
            values
                .iter()
                .map(T::to_string)
                .collect::<Vec<_>>()
                .join(",")
        }
        match self {
            ExtraValue::Str(s) | ExtraValue::Uri(s) | ExtraValue::Component(s) => Some(s.clone()),
            ExtraValue::Null => None,
            ExtraValue::Bool(b) => Some(b.to_string()),
            ExtraValue::Int(i) => Some(i.to_string()),
            ExtraValue::Long(l) => Some(l.to_string()),
            ExtraValue::Float(f) => Some(f.to_string()),
            ExtraValue::IntArray(v) => Some(join(v)),
            ExtraValue::LongArray(v) => Some(join(v)),
            ExtraValue::FloatArray(v) => Some(join(v)),
            ExtraValue::StrArray(v) => Some(v.join(",")),
        }
    }
}

// Plain-value conversions for map-style callers.
impl From<&str> for ExtraValue {
    fn from(s: &str) -> Self {
        ExtraValue::Str(s.to_string())
    }
}

impl From<String> for ExtraValue {
    fn from(s: String) -> Self {
        ExtraValue::Str(s)
    }
}

impl From<bool> for ExtraValue {
    fn from(b: bool) -> Self {
        ExtraValue::Bool(b)
    }
}

impl From<i32> for ExtraValue {
    fn from(i: i32) -> Self {
        ExtraValue::Int(i)
    }
}

impl From<i64> for ExtraValue {
    fn from(l: i64) -> Self {
        ExtraValue::Long(l)
    }
}

impl From<f32> for ExtraValue {
    fn from(f: f32) -> Self {
        ExtraValue::Float(f)
    }
}

/// A structured activity description, encoded to an `am` argument vector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Intent {
    pub action: Option<String>,
    pub data_uri: Option<String>,
    pub mime_type: Option<String>,
    pub categories: Vec<String>,
    pub component: Option<String>,
    pub flags: Option<u32>,
    pub extras: Vec<(String, ExtraValue)>,
}

impl Intent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn data_uri(mut self, uri: impl Into<String>) -> Self {
        self.data_uri = Some(uri.into());
        self
    }

    pub fn mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }

    pub fn component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn flags(mut self, flags: u32) -> Self {
        self.flags = Some(flags);
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: impl Into<ExtraValue>) -> Self {
        self.extras.push((key.into(), value.into()));
        self
    }

    /// Encode into the argument vector that follows `am start` /
    /// `am broadcast`. Arguments are unescaped; callers quote them for the
    /// device shell.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(action) = &self.action {
            args.push("-a".to_string());
            args.push(action.clone());
        }
        if let Some(uri) = &self.data_uri {
            args.push("-d".to_string());
            args.push(uri.clone());
        }
        if let Some(mime) = &self.mime_type {
            args.push("-t".to_string());
            args.push(mime.clone());
        }
        for category in &self.categories {
            args.push("-c".to_string());
            args.push(category.clone());
        }
        if let Some(component) = &self.component {
            args.push("-n".to_string());
            args.push(component.clone());
        }
        if let Some(flags) = self.flags {
            args.push("-f".to_string());
            args.push(flags.to_string());
        }
        for (key, value) in &self.extras {
            args.push(value.flag().to_string());
            args.push(key.clone());
            if let Some(formatted) = value.value_string() {
                args.push(formatted);
            }
        }
        args
    }
}
