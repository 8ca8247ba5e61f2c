error_chain! {
    links {
        Core(musubi::errors::Error, musubi::errors::ErrorKind);
    }

    errors {
        UnknownHook(hook: String) {
            description("unknown hook")
            display("no function prototype `{}` in the program", hook)
        }
        DuplicateHook(hook: String) {
            description("hook declared twice")
            display("prototype `{}` is declared more than once", hook)
        }
        HookSignatureMismatch(hook: String, expected: String, found: String) {
            description("object does not match the hook prototype")
            display("hook `{}` is `{}`, cannot attach `{}`", hook, expected, found)
        }
        NotAChain(hook: String) {
            description("hook is not a chain")
            display("hook `{}` is not attached to a function chain", hook)
        }
        Backend(reason: String) {
            description("backend failure")
            display("backend error: {}", reason)
        }
    }
}
