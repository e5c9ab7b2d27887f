//! The template function registry.
//!
//! This table is the only list of callable functions. The parser refuses to
//! resolve any name not found here, and the security validator reports any
//! such name as an unsafe call. Nothing in it touches the environment, the
//! filesystem, processes or the network.

use std::fmt;

use base64::Engine;
use heck::{ToKebabCase, ToLowerCamelCase, ToPascalCase, ToSnakeCase};

use super::value::Value;

/// Largest width or precision accepted in a `printf` verb.
pub const MAX_FORMAT_WIDTH: usize = 256;

/// Largest string `repeat` may produce, in bytes.
pub const MAX_REPEAT_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCategory {
    Logic,
    String,
    Case,
    Number,
    List,
    Format,
    Encoding,
}

impl fmt::Display for FunctionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Logic => "logic",
            Self::String => "string",
            Self::Case => "case",
            Self::Number => "number",
            Self::List => "list",
            Self::Format => "format",
            Self::Encoding => "encoding",
        };
        f.write_str(s)
    }
}

type Call = fn(&[Value]) -> Result<Value, String>;

pub struct FunctionDef {
    pub name: &'static str,
    pub category: FunctionCategory,
    call: Call,
}

impl FunctionDef {
    pub(crate) fn call(&self, args: &[Value]) -> Result<Value, String> {
        (self.call)(args).map_err(|e| format!("{}: {e}", self.name))
    }
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("category", &self.category)
            .finish()
    }
}

macro_rules! registry {
    ($($name:literal => $cat:ident, $func:path;)*) => {
        pub static FUNCTIONS: &[FunctionDef] = &[
            $(FunctionDef { name: $name, category: FunctionCategory::$cat, call: $func },)*
        ];
    };
}

registry! {
    "eq" => Logic, eq;
    "ne" => Logic, ne;
    "lt" => Logic, lt;
    "le" => Logic, le;
    "gt" => Logic, gt;
    "ge" => Logic, ge;
    "and" => Logic, and;
    "or" => Logic, or;
    "not" => Logic, not;
    "default" => Logic, default;
    "empty" => Logic, empty;
    "len" => List, len;
    "lower" => String, lower;
    "upper" => String, upper;
    "title" => String, title;
    "trim" => String, trim;
    "trimPrefix" => String, trim_prefix;
    "trimSuffix" => String, trim_suffix;
    "replace" => String, replace;
    "contains" => String, contains;
    "hasPrefix" => String, has_prefix;
    "hasSuffix" => String, has_suffix;
    "repeat" => String, repeat;
    "snakeCase" => Case, snake_case;
    "kebabCase" => Case, kebab_case;
    "camelCase" => Case, camel_case;
    "pascalCase" => Case, pascal_case;
    "quote" => Format, quote;
    "printf" => Format, printf;
    "print" => Format, print;
    "add" => Number, add;
    "sub" => Number, sub;
    "mul" => Number, mul;
    "split" => List, split;
    "join" => List, join;
    "list" => List, list;
    "first" => List, first;
    "last" => List, last;
    "b64enc" => Encoding, b64enc;
    "urlquery" => Encoding, urlquery;
    "html" => Encoding, html;
    "js" => Encoding, js;
}

pub fn lookup(name: &str) -> Option<&'static FunctionDef> {
    FUNCTIONS.iter().find(|f| f.name == name)
}

pub fn is_allowed(name: &str) -> bool {
    lookup(name).is_some()
}

// ============================================================================
// Argument helpers
// ============================================================================

fn arity(args: &[Value], n: usize) -> Result<(), String> {
    if args.len() == n {
        Ok(())
    } else {
        Err(format!("expected {n} argument(s), got {}", args.len()))
    }
}

fn at_least(args: &[Value], n: usize) -> Result<(), String> {
    if args.len() >= n {
        Ok(())
    } else {
        Err(format!("expected at least {n} argument(s), got {}", args.len()))
    }
}

fn int(v: &Value) -> Result<i64, String> {
    v.as_int()
        .ok_or_else(|| format!("expected an integer, got {} '{v}'", v.type_name()))
}

fn text1(args: &[Value], f: impl Fn(&str) -> String) -> Result<Value, String> {
    arity(args, 1)?;
    Ok(Value::Str(f(&args[0].text())))
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::List(x), Value::List(y)) => x == y,
        _ => a.text() == b.text(),
    }
}

fn compare(args: &[Value]) -> Result<std::cmp::Ordering, String> {
    arity(args, 2)?;
    match (args[0].as_int(), args[1].as_int()) {
        (Some(a), Some(b)) => Ok(a.cmp(&b)),
        _ => Ok(args[0].text().cmp(&args[1].text())),
    }
}

fn list_arg(v: &Value) -> Result<&[Value], String> {
    match v {
        Value::List(items) => Ok(items),
        other => Err(format!("expected a list, got {}", other.type_name())),
    }
}

// ============================================================================
// Logic
// ============================================================================

fn eq(args: &[Value]) -> Result<Value, String> {
    at_least(args, 2)?;
    Ok(Value::Bool(args[1..].iter().any(|b| loose_eq(&args[0], b))))
}

fn ne(args: &[Value]) -> Result<Value, String> {
    arity(args, 2)?;
    Ok(Value::Bool(!loose_eq(&args[0], &args[1])))
}

fn lt(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Bool(compare(args)?.is_lt()))
}

fn le(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Bool(compare(args)?.is_le()))
}

fn gt(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Bool(compare(args)?.is_gt()))
}

fn ge(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Bool(compare(args)?.is_ge()))
}

/// First falsy argument, or the last one.
fn and(args: &[Value]) -> Result<Value, String> {
    at_least(args, 1)?;
    let picked = args.iter().find(|v| !v.is_truthy()).unwrap_or(&args[args.len() - 1]);
    Ok(picked.clone())
}

/// First truthy argument, or the last one.
fn or(args: &[Value]) -> Result<Value, String> {
    at_least(args, 1)?;
    let picked = args.iter().find(|v| v.is_truthy()).unwrap_or(&args[args.len() - 1]);
    Ok(picked.clone())
}

fn not(args: &[Value]) -> Result<Value, String> {
    arity(args, 1)?;
    Ok(Value::Bool(!args[0].is_truthy()))
}

/// `default FALLBACK VALUE`: VALUE unless it is empty.
fn default(args: &[Value]) -> Result<Value, String> {
    match args {
        [fallback] => Ok(fallback.clone()),
        [fallback, value] if value.is_empty() => Ok(fallback.clone()),
        [_, value] => Ok(value.clone()),
        _ => Err(format!("expected 1 or 2 arguments, got {}", args.len())),
    }
}

fn empty(args: &[Value]) -> Result<Value, String> {
    arity(args, 1)?;
    Ok(Value::Bool(args[0].is_empty()))
}

fn len(args: &[Value]) -> Result<Value, String> {
    arity(args, 1)?;
    let n = match &args[0] {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.len(),
        other => return Err(format!("can't take length of {}", other.type_name())),
    };
    Ok(Value::Int(n as i64))
}

// ============================================================================
// Strings
// ============================================================================

fn lower(args: &[Value]) -> Result<Value, String> {
    text1(args, str::to_lowercase)
}

fn upper(args: &[Value]) -> Result<Value, String> {
    text1(args, str::to_uppercase)
}

fn title(args: &[Value]) -> Result<Value, String> {
    text1(args, |s| {
        let mut out = String::with_capacity(s.len());
        let mut at_word_start = true;
        for c in s.chars() {
            if at_word_start && c.is_alphabetic() {
                out.extend(c.to_uppercase());
            } else {
                out.push(c);
            }
            at_word_start = c.is_whitespace() || c == '-' || c == '_';
        }
        out
    })
}

fn trim(args: &[Value]) -> Result<Value, String> {
    text1(args, |s| s.trim().to_string())
}

fn trim_prefix(args: &[Value]) -> Result<Value, String> {
    arity(args, 2)?;
    let (prefix, s) = (args[0].text(), args[1].text());
    Ok(Value::Str(s.strip_prefix(prefix.as_str()).unwrap_or(&s).to_string()))
}

fn trim_suffix(args: &[Value]) -> Result<Value, String> {
    arity(args, 2)?;
    let (suffix, s) = (args[0].text(), args[1].text());
    Ok(Value::Str(s.strip_suffix(suffix.as_str()).unwrap_or(&s).to_string()))
}

/// `replace OLD NEW S`
fn replace(args: &[Value]) -> Result<Value, String> {
    arity(args, 3)?;
    Ok(Value::Str(args[2].text().replace(&args[0].text(), &args[1].text())))
}

/// `contains SUBSTR S`
fn contains(args: &[Value]) -> Result<Value, String> {
    arity(args, 2)?;
    Ok(Value::Bool(args[1].text().contains(&args[0].text())))
}

fn has_prefix(args: &[Value]) -> Result<Value, String> {
    arity(args, 2)?;
    Ok(Value::Bool(args[1].text().starts_with(&args[0].text())))
}

fn has_suffix(args: &[Value]) -> Result<Value, String> {
    arity(args, 2)?;
    Ok(Value::Bool(args[1].text().ends_with(&args[0].text())))
}

/// `repeat COUNT S`
fn repeat(args: &[Value]) -> Result<Value, String> {
    arity(args, 2)?;
    let count = int(&args[0])?;
    let s = args[1].text();
    let count = usize::try_from(count).map_err(|_| "count must not be negative".to_string())?;
    if s.len().saturating_mul(count) > MAX_REPEAT_BYTES {
        return Err(format!("result would exceed {MAX_REPEAT_BYTES} bytes"));
    }
    Ok(Value::Str(s.repeat(count)))
}

// ============================================================================
// Case conversion
// ============================================================================

fn snake_case(args: &[Value]) -> Result<Value, String> {
    text1(args, |s| s.to_snake_case())
}

fn kebab_case(args: &[Value]) -> Result<Value, String> {
    text1(args, |s| s.to_kebab_case())
}

fn camel_case(args: &[Value]) -> Result<Value, String> {
    text1(args, |s| s.to_lower_camel_case())
}

fn pascal_case(args: &[Value]) -> Result<Value, String> {
    text1(args, |s| s.to_pascal_case())
}

// ============================================================================
// Formatting
// ============================================================================

fn quote_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn quote(args: &[Value]) -> Result<Value, String> {
    let quoted: Vec<String> = args.iter().map(|v| quote_str(&v.text())).collect();
    Ok(Value::Str(quoted.join(" ")))
}

/// Concatenate, inserting a space between operands when neither is a string.
fn print(args: &[Value]) -> Result<Value, String> {
    let mut out = String::new();
    for (i, v) in args.iter().enumerate() {
        if i > 0 && !matches!(v, Value::Str(_)) && !matches!(args[i - 1], Value::Str(_)) {
            out.push(' ');
        }
        out.push_str(&v.text());
    }
    Ok(Value::Str(out))
}

struct Spec {
    left: bool,
    zero: bool,
    plus: bool,
    width: usize,
    precision: Option<usize>,
}

fn read_number(chars: &[char], i: &mut usize) -> Result<Option<usize>, String> {
    if chars.get(*i) == Some(&'*') {
        return Err("'*' width is not supported".into());
    }
    let start = *i;
    while *i < chars.len() && chars[*i].is_ascii_digit() {
        *i += 1;
    }
    if start == *i {
        return Ok(None);
    }
    let digits: String = chars[start..*i].iter().collect();
    let n: usize = digits
        .parse()
        .map_err(|_| format!("width '{digits}' is too large"))?;
    if n > MAX_FORMAT_WIDTH {
        return Err(format!("width {n} exceeds maximum of {MAX_FORMAT_WIDTH}"));
    }
    Ok(Some(n))
}

fn format_one(spec: &Spec, verb: char, arg: &Value) -> Result<String, String> {
    let mut body = match verb {
        's' | 'v' => arg.text(),
        'q' => quote_str(&arg.text()),
        't' => match arg {
            Value::Bool(b) => b.to_string(),
            other => other.text(),
        },
        'd' => {
            let n = int(arg)?;
            if spec.plus && n >= 0 { format!("+{n}") } else { n.to_string() }
        }
        'x' => format!("{:x}", int(arg)?),
        'X' => format!("{:X}", int(arg)?),
        other => return Err(format!("unsupported verb '%{other}'")),
    };
    if let (Some(p), 's' | 'v' | 'q') = (spec.precision, verb) {
        body = body.chars().take(p).collect();
    }
    let len = body.chars().count();
    if len >= spec.width {
        return Ok(body);
    }
    let pad = spec.width - len;
    Ok(if spec.left {
        format!("{body}{}", " ".repeat(pad))
    } else if spec.zero && matches!(verb, 'd' | 'x' | 'X') {
        match body.strip_prefix(['-', '+']) {
            Some(digits) => format!("{}{}{digits}", &body[..1], "0".repeat(pad)),
            None => format!("{}{body}", "0".repeat(pad)),
        }
    } else {
        format!("{}{body}", " ".repeat(pad))
    })
}

/// Go-style `printf` supporting `%s %v %q %d %t %x %X %%` with
/// `-`, `+`, `0` flags, width, and precision.
fn printf(args: &[Value]) -> Result<Value, String> {
    at_least(args, 1)?;
    let format = args[0].text();
    let chars: Vec<char> = format.chars().collect();
    let mut rest = args[1..].iter();
    let mut out = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut spec = Spec {
            left: false,
            zero: false,
            plus: false,
            width: 0,
            precision: None,
        };
        while let Some(&flag) = chars.get(i) {
            match flag {
                '-' => spec.left = true,
                '0' => spec.zero = true,
                '+' => spec.plus = true,
                ' ' | '#' => {}
                _ => break,
            }
            i += 1;
        }
        spec.width = read_number(&chars, &mut i)?.unwrap_or(0);
        if chars.get(i) == Some(&'.') {
            i += 1;
            spec.precision = Some(read_number(&chars, &mut i)?.unwrap_or(0));
        }
        let Some(&verb) = chars.get(i) else {
            return Err("format ends with an incomplete verb".into());
        };
        i += 1;
        if verb == '%' {
            out.push('%');
            continue;
        }
        let arg = rest
            .next()
            .ok_or_else(|| format!("missing argument for '%{verb}'"))?;
        out.push_str(&format_one(&spec, verb, arg)?);
    }

    if rest.next().is_some() {
        return Err("too many arguments for format".into());
    }
    Ok(Value::Str(out))
}

// ============================================================================
// Numbers
// ============================================================================

fn arith(args: &[Value], op: fn(i64, i64) -> Option<i64>) -> Result<Value, String> {
    arity(args, 2)?;
    op(int(&args[0])?, int(&args[1])?)
        .map(Value::Int)
        .ok_or_else(|| "integer overflow".to_string())
}

fn add(args: &[Value]) -> Result<Value, String> {
    arith(args, i64::checked_add)
}

fn sub(args: &[Value]) -> Result<Value, String> {
    arith(args, i64::checked_sub)
}

fn mul(args: &[Value]) -> Result<Value, String> {
    arith(args, i64::checked_mul)
}

// ============================================================================
// Lists
// ============================================================================

/// `split SEP S` → list of strings.
fn split(args: &[Value]) -> Result<Value, String> {
    arity(args, 2)?;
    let (sep, s) = (args[0].text(), args[1].text());
    if s.is_empty() {
        return Ok(Value::List(Vec::new()));
    }
    let parts = if sep.is_empty() {
        s.chars().map(|c| Value::Str(c.to_string())).collect()
    } else {
        s.split(sep.as_str()).map(Value::from).collect()
    };
    Ok(Value::List(parts))
}

/// `join SEP LIST`
fn join(args: &[Value]) -> Result<Value, String> {
    arity(args, 2)?;
    let sep = args[0].text();
    let items = list_arg(&args[1])?;
    Ok(Value::Str(
        items.iter().map(Value::text).collect::<Vec<_>>().join(&sep),
    ))
}

fn list(args: &[Value]) -> Result<Value, String> {
    Ok(Value::List(args.to_vec()))
}

fn first(args: &[Value]) -> Result<Value, String> {
    arity(args, 1)?;
    Ok(list_arg(&args[0])?
        .first()
        .cloned()
        .unwrap_or(Value::Str(String::new())))
}

fn last(args: &[Value]) -> Result<Value, String> {
    arity(args, 1)?;
    Ok(list_arg(&args[0])?
        .last()
        .cloned()
        .unwrap_or(Value::Str(String::new())))
}

// ============================================================================
// Encoding
// ============================================================================

fn b64enc(args: &[Value]) -> Result<Value, String> {
    text1(args, |s| base64::engine::general_purpose::STANDARD.encode(s))
}

fn urlquery(args: &[Value]) -> Result<Value, String> {
    let joined: String = args.iter().map(Value::text).collect();
    Ok(Value::Str(urlencoding::encode(&joined).into_owned()))
}

fn html(args: &[Value]) -> Result<Value, String> {
    let joined: String = args.iter().map(Value::text).collect();
    let mut out = String::with_capacity(joined.len());
    for c in joined.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            '\0' => out.push('\u{FFFD}'),
            c => out.push(c),
        }
    }
    Ok(Value::Str(out))
}

fn js(args: &[Value]) -> Result<Value, String> {
    let joined: String = args.iter().map(Value::text).collect();
    let mut out = String::with_capacity(joined.len());
    for c in joined.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '<' | '>' | '&' | '=' => out.push_str(&format!("\\u{:04X}", c as u32)),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    Ok(Value::Str(out))
}
