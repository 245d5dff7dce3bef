/// An option the parser does not model. `name` is the flag without its leading dashes
/// (empty for stray positional tokens), `value` is its raw argument (empty for bare flags).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtraArg {
    pub name: String,
    pub value: String,
}

impl ExtraArg {
    pub fn is_positional(&self) -> bool {
        self.name.is_empty()
    }

    /// The tokens of this one option, using a single leading dash for the flag.
    pub fn to_args(&self) -> Vec<String> {
        let flag = (!self.is_positional()).then(|| format!("-{}", self.name));
        let value = (!self.value.is_empty()).then(|| self.value.clone());
        flag.into_iter().chain(value).collect()
    }
}

/// Unrecognized options, kept in command-line order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtraArgs(Vec<ExtraArg>);

impl ExtraArgs {
    pub(crate) fn push(&mut self, flag: &str, value: Option<&str>) {
        self.0.push(ExtraArg {
            name: flag.trim_start_matches('-').to_string(),
            value: value.unwrap_or_default().to_string(),
        });
    }

    /// First value recorded for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.iter().find(|arg| arg.name == name).map(|arg| arg.value.as_str())
    }
    pub fn iter(&self) -> impl Iterator<Item = &ExtraArg> {
        self.0.iter()
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Rebuilds the tokens. Stray positionals come first so that reading the tokens back
    /// cannot take one of them as the value of a bare flag.
    pub fn to_args(&self) -> Vec<String> {
        let (positional, flags): (Vec<&ExtraArg>, Vec<&ExtraArg>) = self.0.iter().partition(|arg| arg.is_positional());
        positional.into_iter().chain(flags).flat_map(ExtraArg::to_args).collect()
    }
}

impl<'a> IntoIterator for &'a ExtraArgs {
    type Item = &'a ExtraArg;
    type IntoIter = std::slice::Iter<'a, ExtraArg>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
