//! Node, relationship, and path pattern productions, plus property maps.

use super::Cursor;
use crate::ast::*;
use crate::error::Error;
use crate::lexer::TokenType;

impl Cursor {
    pub(crate) fn pattern_list(&mut self) -> Result<Vec<Pattern>, Error> {
        let mut patterns = vec![self.pattern()?];
        while self.eat(&TokenType::Comma) {
            patterns.push(self.pattern()?);
        }
        Ok(patterns)
    }

    /// `[name =] (node) ([rel] (node))*`
    pub(crate) fn pattern(&mut self) -> Result<Pattern, Error> {
        self.burn()?;

        let variable = if matches!(self.kind(), TokenType::Identifier(_))
            && self.kind_ahead(1) == &TokenType::Equals
        {
            let name = self.identifier("path variable")?;
            self.bump(); // '='
            Some(name)
        } else {
            None
        };

        let mut elements = vec![PathElement::Node(self.node_pattern()?)];
        while matches!(self.kind(), TokenType::Dash | TokenType::LeftArrow) {
            elements.push(PathElement::Relationship(self.relationship_pattern()?));
            elements.push(PathElement::Node(self.node_pattern()?));
        }

        Ok(Pattern { variable, elements })
    }

    /// `( [name] [:Label]* [{props}] )`
    fn node_pattern(&mut self) -> Result<NodePattern, Error> {
        self.expect(&TokenType::LeftParen, "'(' opening a node pattern")?;

        let variable = match self.kind() {
            TokenType::Identifier(name) => {
                let name = name.clone();
                self.bump();
                Some(name)
            }
            _ => None,
        };

        let mut labels = Vec::new();
        while self.eat(&TokenType::Colon) {
            labels.push(self.name_like("label name after ':'")?);
        }

        let properties = if self.at(&TokenType::LeftBrace) {
            Some(self.property_map()?)
        } else {
            None
        };

        self.expect(&TokenType::RightParen, "')' closing a node pattern")?;
        Ok(NodePattern {
            variable,
            labels,
            properties,
        })
    }

    /// `-[...]->`, `<-[...]-`, `-[...]-`, or the bracketless `-->`/`<--`/`--`.
    fn relationship_pattern(&mut self) -> Result<RelationshipPattern, Error> {
        let from_left = match self.kind() {
            TokenType::LeftArrow => {
                self.bump();
                true
            }
            TokenType::Dash => {
                self.bump();
                false
            }
            _ => return Err(self.unexpected("'-' or '<-' starting a relationship")),
        };

        let mut variable = None;
        let mut types = Vec::new();
        let mut properties = None;
        let mut variable_length = None;

        if self.eat(&TokenType::LeftBracket) {
            if let TokenType::Identifier(name) = self.kind() {
                variable = Some(name.clone());
                self.bump();
            }

            if self.eat(&TokenType::Colon) {
                loop {
                    let ty = self.name_like("relationship type")?;
                    if !types.contains(&ty) {
                        types.push(ty);
                    }
                    if !self.eat(&TokenType::Pipe) {
                        break;
                    }
                    // [:A|B] and [:A|:B] both spell alternatives.
                    self.eat(&TokenType::Colon);
                }
            }

            if self.eat(&TokenType::Asterisk) {
                variable_length = Some(self.hop_bounds()?);
            }

            if self.at(&TokenType::LeftBrace) {
                properties = Some(self.property_map()?);
            }

            self.expect(&TokenType::RightBracket, "']' closing a relationship")?;
        }

        let to_right = match self.kind() {
            TokenType::RightArrow => {
                self.bump();
                true
            }
            TokenType::Dash => {
                self.bump();
                false
            }
            _ => return Err(self.unexpected("'->' or '-' ending a relationship")),
        };

        let direction = match (from_left, to_right) {
            (false, true) => RelationshipDirection::LeftToRight,
            (true, false) => RelationshipDirection::RightToLeft,
            (false, false) => RelationshipDirection::Undirected,
            (true, true) => {
                return Err(Error::Other(
                    "syntax error: a relationship cannot point both ways".into(),
                ));
            }
        };

        Ok(RelationshipPattern {
            variable,
            types,
            direction,
            properties,
            variable_length,
        })
    }

    /// After '*': `` | `n` | `n..` | `n..m` | `..m`. A bare `*` leaves both
    /// bounds open (one to unbounded); a single number pins both.
    fn hop_bounds(&mut self) -> Result<VariableLength, Error> {
        let low = self.hop_count()?;
        if self.eat(&TokenType::RangeDots) {
            let high = self.hop_count()?;
            Ok(VariableLength {
                min: low,
                max: high,
            })
        } else {
            Ok(VariableLength { min: low, max: low })
        }
    }

    fn hop_count(&mut self) -> Result<Option<u32>, Error> {
        match self.kind() {
            TokenType::Number(n) if n.is_integer() => {
                let raw = n.raw.clone();
                self.bump();
                raw.parse::<u32>().map(Some).map_err(|_| {
                    Error::Other(format!("syntax error: hop count out of range: {raw}"))
                })
            }
            _ => Ok(None),
        }
    }

    /// `{ key: expr, ... }`
    pub(crate) fn property_map(&mut self) -> Result<PropertyMap, Error> {
        self.expect(&TokenType::LeftBrace, "'{' opening a property map")?;
        let mut properties = Vec::new();
        if !self.at(&TokenType::RightBrace) {
            loop {
                let key = self.name_like("property key")?;
                self.expect(&TokenType::Colon, "':' after property key")?;
                let value = self.expression()?;
                properties.push(PropertyPair { key, value });
                if !self.eat(&TokenType::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenType::RightBrace, "'}' closing a property map")?;
        Ok(PropertyMap { properties })
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{Clause, PathElement, RelationshipDirection};
    use crate::parser::Parser;

    fn first_pattern(cypher: &str) -> crate::ast::Pattern {
        let query = Parser::parse(cypher).expect("query should parse");
        let Clause::Match(m) = &query.clauses[0] else {
            panic!("expected MATCH");
        };
        m.patterns[0].clone()
    }

    #[test]
    fn full_path_alternates_nodes_and_relationships() {
        let pattern = first_pattern("MATCH (a:Person)-[r:KNOWS {since: 2020}]->(b) RETURN a");
        assert_eq!(pattern.elements.len(), 3);
        let PathElement::Relationship(rel) = &pattern.elements[1] else {
            panic!("expected a relationship in the middle");
        };
        assert_eq!(rel.types, vec!["KNOWS"]);
        assert_eq!(rel.direction, RelationshipDirection::LeftToRight);
        assert!(rel.properties.is_some());
    }

    #[test]
    fn reversed_and_undirected_arrows() {
        let pattern = first_pattern("MATCH (a)<-[:IN]-(b) RETURN a");
        let PathElement::Relationship(rel) = &pattern.elements[1] else {
            panic!("expected a relationship");
        };
        assert_eq!(rel.direction, RelationshipDirection::RightToLeft);

        let pattern = first_pattern("MATCH (a)--(b) RETURN a");
        let PathElement::Relationship(rel) = &pattern.elements[1] else {
            panic!("expected a relationship");
        };
        assert_eq!(rel.direction, RelationshipDirection::Undirected);
        assert!(rel.types.is_empty());
    }

    #[test]
    fn variable_length_bounds() {
        let pattern = first_pattern("MATCH (a)-[:KNOWS*2..4]->(b) RETURN a");
        let PathElement::Relationship(rel) = &pattern.elements[1] else {
            panic!("expected a relationship");
        };
        let bounds = rel.variable_length.as_ref().unwrap();
        assert_eq!((bounds.min, bounds.max), (Some(2), Some(4)));

        let pattern = first_pattern("MATCH (a)-[*]->(b) RETURN a");
        let PathElement::Relationship(rel) = &pattern.elements[1] else {
            panic!("expected a relationship");
        };
        let bounds = rel.variable_length.as_ref().unwrap();
        assert_eq!((bounds.min, bounds.max), (None, None));
    }

    #[test]
    fn path_variable_binds_the_whole_pattern() {
        let pattern = first_pattern("MATCH p = (a)-[:R]->(b) RETURN p");
        assert_eq!(pattern.variable.as_deref(), Some("p"));
    }

    #[test]
    fn type_alternatives_deduplicate() {
        let pattern = first_pattern("MATCH (a)-[:A|B|:A]->(b) RETURN a");
        let PathElement::Relationship(rel) = &pattern.elements[1] else {
            panic!("expected a relationship");
        };
        assert_eq!(rel.types, vec!["A", "B"]);
    }
}
