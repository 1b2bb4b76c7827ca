/// Replace `${ENV_VAR}` placeholders in raw config text.
///
/// Unresolvable variables are left as-is.
pub fn substitute_env(input: &str) -> String {
    substitute_with(input, |name| std::env::var(name).ok())
}

fn substitute_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' || chars.peek() != Some(&'{') {
            result.push(ch);
            continue;
        }
        chars.next();

        let mut var_name = String::new();
        let mut closed = false;
        for c in chars.by_ref() {
            if c == '}' {
                closed = true;
                break;
            }
            var_name.push(c);
        }

        match (closed, var_name.is_empty()) {
            (true, false) => match lookup(&var_name) {
                Some(val) => result.push_str(&val),
                None => {
                    result.push_str("${");
                    result.push_str(&var_name);
                    result.push('}');
                },
            },
            (true, true) => result.push_str("${}"),
            // Malformed, emit literal.
            (false, _) => {
                result.push_str("${");
                result.push_str(&var_name);
            },
        }
    }

    result
}
