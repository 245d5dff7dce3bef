use std::borrow::Cow;

pub type QemuArg = Cow<'static, str>;

pub struct ArgDisplay {
    pub name: Cow<'static, str>,
    pub value: Cow<'static, str>,
}

pub trait EmulatorArgs {
    fn display(&self) -> impl IntoIterator<Item = ArgDisplay> {
        None
    }
    fn qemu_args(&self) -> impl IntoIterator<Item = QemuArg>;
}

pub(crate) fn plural_if(condition: bool) -> &'static str {
    if condition {
        "s"
    } else {
        ""
    }
}

#[macro_export]
macro_rules! arg {
    ($arg:expr) => {
        std::borrow::Cow::Borrowed($arg)
    };
}

#[macro_export]
macro_rules! oarg {
    ($arg:expr) => {
        std::borrow::Cow::Owned($arg)
    };
}
