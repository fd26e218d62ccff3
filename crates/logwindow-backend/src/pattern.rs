/// Server-side filter pattern in the log service's plain-term syntax.
///
/// Terms are separated by whitespace; a double-quoted phrase is one term.
/// Every term must occur in the message, and a term prefixed with `-` must
/// not occur. An empty pattern matches everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterPattern {
    terms: Vec<Term>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Term {
    text: String,
    exclude: bool,
}

impl FilterPattern {
    pub fn parse(pattern: &str) -> Self {
        let mut terms = Vec::new();
        let mut current = String::new();
        let mut exclude = false;
        let mut quoted = false;

        for c in pattern.chars() {
            match c {
                '"' => quoted = !quoted,
                '-' if !quoted && current.is_empty() && !exclude => exclude = true,
                c if c.is_whitespace() && !quoted => {
                    push_term(&mut terms, &mut current, &mut exclude);
                }
                c => current.push(c),
            }
        }
        push_term(&mut terms, &mut current, &mut exclude);

        Self { terms }
    }

    /// Check if a message satisfies every term
    pub fn matches(&self, message: &str) -> bool {
        self.terms
            .iter()
            .all(|term| message.contains(term.text.as_str()) != term.exclude)
    }

    /// Check if the pattern matches everything
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

fn push_term(terms: &mut Vec<Term>, current: &mut String, exclude: &mut bool) {
    if !current.is_empty() {
        terms.push(Term {
            text: std::mem::take(current),
            exclude: *exclude,
        });
    }
    *exclude = false;
}
