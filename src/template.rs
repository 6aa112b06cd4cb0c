use std::collections::BTreeMap;

/// Substitution map for command and build-arg templates.
///
/// The set of substitutable keys is closed: each call site enumerates the
/// values it exposes (e.g. `benchmark.name`, `runner.mount_dir`) instead of
/// resolving arbitrary attribute paths at render time.
pub type Substitutions = BTreeMap<&'static str, String>;

/// Renders `{key}` placeholders in `template` from `subs`.
///
/// `{{` and `}}` are escapes for literal braces. Placeholders without a
/// mapping are kept verbatim and logged, so a template written against an
/// attribute that is still unknown (e.g. an unprobed workdir) degrades
/// loudly instead of panicking.
pub fn render(template: &str, subs: &Substitutions) -> String {
  let mut out = String::with_capacity(template.len());
  let mut chars = template.chars().peekable();

  while let Some(c) = chars.next() {
    match c {
      '{' if chars.peek() == Some(&'{') => {
        chars.next();
        out.push('{');
      }
      '}' if chars.peek() == Some(&'}') => {
        chars.next();
        out.push('}');
      }
      '{' => {
        let mut key = String::new();
        let mut closed = false;
        for k in chars.by_ref() {
          if k == '}' {
            closed = true;
            break;
          }
          key.push(k);
        }
        if !closed {
          // Unterminated placeholder, keep the raw text
          out.push('{');
          out.push_str(&key);
        } else if let Some(value) = subs.get(key.as_str()) {
          out.push_str(value);
        } else {
          tracing::warn!("Unknown template placeholder '{{{}}}' left as-is", key);
          out.push('{');
          out.push_str(&key);
          out.push('}');
        }
      }
      _ => out.push(c),
    }
  }

  out
}

#[cfg(test)]
mod tests {
  use super::*;

  fn subs(pairs: &[(&'static str, &str)]) -> Substitutions {
    pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
  }

  #[test]
  fn substitutes_known_keys() {
    let s = subs(&[("benchmark.name", "flex-1"), ("engine.name", "saver")]);
    assert_eq!(
      render("run {engine.name} on {benchmark.name}", &s),
      "run saver on flex-1"
    );
  }

  #[test]
  fn keeps_unknown_placeholders() {
    let s = subs(&[("benchmark.name", "flex-1")]);
    assert_eq!(render("cd {benchmark.workdir}", &s), "cd {benchmark.workdir}");
  }

  #[test]
  fn escaped_braces_are_literal() {
    let s = subs(&[("runner.uid", "1000")]);
    assert_eq!(
      render("chown {runner.uid} {{not a key}}", &s),
      "chown 1000 {not a key}"
    );
  }

  #[test]
  fn unterminated_placeholder_kept_verbatim() {
    let s = subs(&[]);
    assert_eq!(render("echo {oops", &s), "echo {oops");
  }

  #[test]
  fn empty_template() {
    assert_eq!(render("", &subs(&[])), "");
  }
}
