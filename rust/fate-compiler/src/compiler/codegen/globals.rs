//! Module-level hoisted declarations: runtime imports, large literals, and
//! cached builder calls. Each is keyed by its canonical text and emitted
//! once no matter how often it is referenced.

use crate::compiler::codegen::writer::CodeBuf;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct Globals {
    imports: Vec<String>,
    literals: Vec<(String, String)>,
    literal_ids: HashMap<String, String>,
    builders: Vec<(String, String)>,
    builder_ids: HashMap<String, String>,
}

impl Globals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local alias of a runtime library function.
    pub fn import(&mut self, name: &str) -> String {
        if !self.imports.iter().any(|n| n == name) {
            tracing::trace!(name, "hoisted runtime import");
            self.imports.push(name.to_string());
        }
        format!("${}", name)
    }

    /// Id of a hoisted literal with the given JavaScript text.
    pub fn literal(&mut self, js: String) -> String {
        if let Some(id) = self.literal_ids.get(&js) {
            return id.clone();
        }
        let id = format!("$l{}", self.literals.len());
        tracing::trace!(%id, "hoisted literal");
        self.literal_ids.insert(js.clone(), id.clone());
        self.literals.push((id.clone(), js));
        id
    }

    /// Id of a cached `$r.<builder>(args)` call.
    pub fn builder(&mut self, builder: &str, args: &[String]) -> String {
        let call = format!("$r.{}({})", builder, args.join(", "));
        if let Some(id) = self.builder_ids.get(&call) {
            return id.clone();
        }
        let id = format!("$b{}", self.builders.len());
        tracing::trace!(%id, builder, "hoisted builder");
        self.builder_ids.insert(call.clone(), id.clone());
        self.builders.push((id.clone(), call));
        id
    }

    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    pub fn render(&self) -> CodeBuf {
        let mut buf = CodeBuf::new();
        for name in &self.imports {
            buf.line(format!("const ${} = $r.{};", name, name));
        }
        for (id, js) in &self.literals {
            buf.line(format!("const {} = {};", id, js));
        }
        for (id, call) in &self.builders {
            buf.line(format!("const {} = {};", id, call));
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_references_hoist_once() {
        let mut g = Globals::new();
        assert_eq!(g.import("isTrue"), "$isTrue");
        assert_eq!(g.import("isTrue"), "$isTrue");
        assert_eq!(g.literal("[1, 2]".into()), "$l0");
        assert_eq!(g.literal("[1, 2]".into()), "$l0");
        assert_eq!(g.literal("[3]".into()), "$l1");
        let args = vec!["\"a+\"".to_string(), "\"g\"".to_string()];
        assert_eq!(g.builder("defineRegex", &args), "$b0");
        assert_eq!(g.builder("defineRegex", &args), "$b0");
        assert_eq!(
            g.render().render(2, 0),
            "const $isTrue = $r.isTrue;\nconst $l0 = [1, 2];\nconst $l1 = [3];\nconst $b0 = $r.defineRegex(\"a+\", \"g\");"
        );
    }
}
