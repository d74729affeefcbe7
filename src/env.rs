use std::{cell::RefCell, ffi::OsStr};

#[derive(Clone, Copy)]
struct Env {
    minimal: bool,
}

thread_local! {
    /// Must only be mutated within `set_env`
    static ENV: RefCell<Option<Env>> = const { RefCell::new(None) };
}

/// Read configuration from the environment. `minimal` forces minimal output on.
pub fn init(minimal: bool) {
    let value = Env {
        minimal: minimal || var_is("LC3_MINIMAL", "1"),
    };
    set_env(value);
}

/// Whether operator status output is suppressed.
///
/// Defaults to full output if the environment was never initialized.
pub fn is_minimal() -> bool {
    ENV.with(|env| env.borrow().is_some_and(|env| env.minimal))
}

fn set_env(value: Env) {
    ENV.with(|env| {
        let mut env = env.borrow_mut();
        assert!(
            env.is_none(),
            "tried to initialize environment state multiple times"
        );
        *env = Some(value);
    });
}

fn var_is(name: impl AsRef<OsStr>, value: impl AsRef<str>) -> bool {
    std::env::var(name.as_ref()).is_ok_and(|v| v == value.as_ref())
}
