use mlua::prelude::*;

pub const DEFAULT_DEPTH: usize = 3;

/// Render a Lua value for diagnostics. Tables nest up to `max_depth`
/// levels, keys sorted so output is stable across runs.
pub fn render(value: &LuaValue, max_depth: usize) -> String {
    let mut out = String::new();
    write_value(&mut out, value, max_depth, 0);
    out
}

fn write_value(out: &mut String, value: &LuaValue, max_depth: usize, indent: usize) {
    match value {
        LuaValue::Nil => out.push_str("nil"),
        LuaValue::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
        LuaValue::Integer(i) => out.push_str(&i.to_string()),
        LuaValue::Number(n) => out.push_str(&format!("{}", n)),
        LuaValue::String(s) => out.push_str(&format!("{:?}", s.to_string_lossy())),
        LuaValue::Table(t) => write_table(out, t, max_depth, indent),
        other => out.push_str(&format!("<{}>", other.type_name())),
    }
}

fn write_table(out: &mut String, table: &LuaTable, max_depth: usize, indent: usize) {
    if max_depth == 0 {
        out.push_str("{...}");
        return;
    }

    let mut entries: Vec<(String, LuaValue)> = table
        .clone()
        .pairs::<LuaValue, LuaValue>()
        .filter_map(|pair| pair.ok())
        .map(|(k, v)| (key_label(&k), v))
        .collect();
    if entries.is_empty() {
        out.push_str("{}");
        return;
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let pad = "  ".repeat(indent + 1);
    out.push_str("{\n");
    for (key, v) in &entries {
        out.push_str(&pad);
        out.push_str(key);
        out.push_str(" = ");
        write_value(out, v, max_depth - 1, indent + 1);
        out.push_str(",\n");
    }
    out.push_str(&"  ".repeat(indent));
    out.push('}');
}

// Integer keys are zero-padded so [2] sorts before [10].
fn key_label(key: &LuaValue) -> String {
    match key {
        LuaValue::Integer(i) => format!("[{:06}]", i),
        LuaValue::String(s) => s.to_string_lossy().to_string(),
        other => format!("[{}]", render(other, 0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars() {
        assert_eq!(render(&LuaValue::Nil, 1), "nil");
        assert_eq!(render(&LuaValue::Integer(3), 1), "3");
        assert_eq!(render(&LuaValue::Boolean(false), 1), "false");
    }

    #[test]
    fn test_depth_bound_cuts_nested_tables() {
        let lua = Lua::new();
        let v: LuaValue = lua.load("return { a = { b = { c = 1 } } }").eval().unwrap();
        let shallow = render(&v, 1);
        assert!(shallow.contains("a = {...}"), "{}", shallow);
        let deep = render(&v, 3);
        assert!(deep.contains("c = 1"), "{}", deep);
    }

    #[test]
    fn test_keys_are_sorted() {
        let lua = Lua::new();
        let v: LuaValue = lua.load("return { zeta = 1, alpha = 2 }").eval().unwrap();
        let s = render(&v, 2);
        assert!(s.find("alpha").unwrap() < s.find("zeta").unwrap());
    }
}
