//! CSS reading for typography
//!
//! Stylesheets and declaration blocks are tokenized with `cssparser`;
//! selectors are parsed and matched with scraper's `selectors`
//! implementation, which also supplies their specificity. Rules inside
//! `@media`, `@supports`, `@layer` and `@document` are flattened into the
//! surrounding sheet, other at-rules are dropped, and selectors scraper
//! cannot parse are skipped.

use cssparser::{
    AtRuleParser, CowRcStr, DeclarationParser, ParseError, Parser, ParserInput, ParserState,
    QualifiedRuleParser, RuleBodyItemParser, RuleBodyParser, Token,
};
use scraper::selector::{self as html_selector, Simple};
use scraper::{ElementRef, Html};
use selectors::matching::{
    self, IgnoreNthChildForInvalidation, MatchingContext, MatchingMode, NeedsSelectorFlags,
    QuirksMode,
};
use selectors::parser::{ParseRelative, Selector, SelectorList};
use std::sync::LazyLock;

static STYLE_SELECTOR: LazyLock<scraper::Selector> =
    LazyLock::new(|| scraper::Selector::parse("style").expect("valid style selector"));

/// At-rules whose nested rules still apply to the page
const NESTING_AT_RULES: &[&str] = &["media", "supports", "layer", "document"];

/// Keywords that may precede the size in the `font` shorthand
const FONT_PREFIX_KEYWORDS: &[&str] = &[
    "normal",
    "italic",
    "oblique",
    "small-caps",
    "bold",
    "bolder",
    "lighter",
    "ultra-condensed",
    "extra-condensed",
    "condensed",
    "semi-condensed",
    "semi-expanded",
    "expanded",
    "extra-expanded",
    "ultra-expanded",
];

const FONT_SIZE_KEYWORDS: &[&str] = &[
    "xx-small",
    "x-small",
    "small",
    "medium",
    "large",
    "x-large",
    "xx-large",
    "xxx-large",
    "smaller",
    "larger",
];

/// Single `property: value` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Lowercased property name
    pub property: String,
    pub value: String,
    pub important: bool,
}

/// Packed selector specificity: ids, then classes, then types, 10 bits each
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Specificity(pub u32);

impl Specificity {
    pub fn of(selector: &Selector<Simple>) -> Self {
        Self(selector.specificity())
    }
}

/// Where a stylesheet comes from; author rules beat user-agent defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Origin {
    UserAgent,
    #[default]
    Author,
}

/// Rule with a single complex selector
#[derive(Debug, Clone)]
pub struct StyleRule {
    pub selector: Selector<Simple>,
    pub specificity: Specificity,
    pub declarations: Vec<Declaration>,
}

impl StyleRule {
    pub fn matches(&self, element: &ElementRef<'_>) -> bool {
        let mut nth_index_cache = Default::default();
        let mut context = MatchingContext::new(
            MatchingMode::Normal,
            None,
            &mut nth_index_cache,
            QuirksMode::NoQuirks,
            NeedsSelectorFlags::No,
            IgnoreNthChildForInvalidation::No,
        );
        matching::matches_selector(&self.selector, 0, None, element, &mut context)
    }
}

/// Ordered list of style rules
#[derive(Debug, Clone, Default)]
pub struct StyleSheet {
    pub origin: Origin,
    pub rules: Vec<StyleRule>,
}

impl StyleSheet {
    /// Parse author stylesheet text, skipping anything it does not understand
    pub fn parse(css: &str) -> Self {
        Self::parse_with_origin(css, Origin::Author)
    }

    pub fn parse_with_origin(css: &str, origin: Origin) -> Self {
        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);
        let mut rule_parser = RuleListParser;

        let rules = cssparser::StyleSheetParser::new(&mut parser, &mut rule_parser)
            .filter_map(|result| match result {
                Ok(rules) => Some(rules),
                Err((error, text)) => {
                    tracing::trace!(rule = text, error = ?error.kind, "Skipping CSS rule");
                    None
                }
            })
            .flatten()
            .collect();

        Self { origin, rules }
    }

    /// Parse every `<style>` block of a document, in document order
    pub fn embedded(document: &Html) -> Vec<StyleSheet> {
        document
            .select(&STYLE_SELECTOR)
            .map(|el| StyleSheet::parse(&el.text().collect::<String>()))
            .collect()
    }
}

/// Parse a declaration block such as the content of a `style` attribute
pub fn parse_declarations(block: &str) -> Vec<Declaration> {
    let mut input = ParserInput::new(block);
    let mut parser = Parser::new(&mut input);
    read_declarations(&mut parser)
}

fn read_declarations(input: &mut Parser<'_, '_>) -> Vec<Declaration> {
    let mut declaration_parser = DeclarationListParser;
    RuleBodyParser::new(input, &mut declaration_parser)
        .flatten()
        .collect()
}

/// Font declarations that apply directly to an element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FontDeclarations {
    pub family: Option<String>,
    pub size: Option<String>,
}

/// Split a `font` shorthand value into its size and family list
///
/// Style, variant, weight and stretch may precede the size, and a
/// `/line-height` may follow it. System fonts and CSS-wide keywords yield
/// `None`.
pub fn expand_font_shorthand(value: &str) -> Option<(String, String)> {
    let mut input = ParserInput::new(value);
    let mut parser = Parser::new(&mut input);

    let size = loop {
        let start = parser.position();
        let token = parser.next().ok()?.clone();
        match token {
            Token::Dimension { .. } | Token::Percentage { .. } => {
                break parser.slice_from(start).trim().to_string();
            }
            Token::Function(_) => {
                parser.parse_nested_block(skip_tokens).ok()?;
                break parser.slice_from(start).trim().to_string();
            }
            Token::Ident(ident) => {
                let ident = ident.to_ascii_lowercase();
                if FONT_SIZE_KEYWORDS.contains(&ident.as_str()) {
                    break ident;
                }
                if !FONT_PREFIX_KEYWORDS.contains(&ident.as_str()) {
                    return None;
                }
            }
            // Numeric font-weight
            Token::Number { .. } => {}
            _ => return None,
        }
    };

    if parser.try_parse(|p| p.expect_delim('/')).is_ok() {
        let token = parser.next().ok()?.clone();
        if matches!(token, Token::Function(_)) {
            parser.parse_nested_block(skip_tokens).ok()?;
        }
    }

    let start = parser.position();
    while parser.next().is_ok() {}
    let family = parser.slice_from(start).trim();
    if family.is_empty() {
        return None;
    }
    Some((size, family.to_string()))
}

/// Cascade inline and sheet declarations of `font-family` and `font-size`
///
/// Importance beats origin, origin beats inline, inline beats specificity,
/// specificity beats source order; later sheets win ties. The `font`
/// shorthand sets both. Values are declared, never inherited.
pub fn declared_font(element: ElementRef<'_>, sheets: &[&StyleSheet]) -> FontDeclarations {
    let mut font = FontCascade::default();
    let mut order = 0usize;

    for sheet in sheets {
        for rule in &sheet.rules {
            order += 1;
            if !rule.matches(&element) {
                continue;
            }
            for decl in &rule.declarations {
                font.offer(
                    (decl.important, sheet.origin, false, rule.specificity, order),
                    decl,
                );
            }
        }
    }

    if let Some(style) = element.value().attr("style") {
        for decl in parse_declarations(style) {
            let key = (
                decl.important,
                Origin::Author,
                true,
                Specificity::default(),
                usize::MAX,
            );
            font.offer(key, &decl);
        }
    }

    FontDeclarations {
        family: font.family.value,
        size: font.size.value,
    }
}

type CascadeKey = (bool, Origin, bool, Specificity, usize);

#[derive(Default)]
struct FontCascade {
    family: Winner,
    size: Winner,
}

impl FontCascade {
    fn offer(&mut self, key: CascadeKey, decl: &Declaration) {
        match decl.property.as_str() {
            "font-family" => self.family.offer(key, &decl.value),
            "font-size" => self.size.offer(key, &decl.value),
            "font" => match expand_font_shorthand(&decl.value) {
                Some((size, family)) => {
                    self.size.offer(key, &size);
                    self.family.offer(key, &family);
                }
                None => tracing::trace!(value = %decl.value, "Unexpanded font shorthand"),
            },
            _ => {}
        }
    }
}

#[derive(Default)]
struct Winner {
    key: Option<CascadeKey>,
    value: Option<String>,
}

impl Winner {
    fn offer(&mut self, key: CascadeKey, value: &str) {
        if self.key.map_or(true, |current| key >= current) {
            self.key = Some(key);
            self.value = Some(value.to_string());
        }
    }
}

fn skip_tokens<'i>(input: &mut Parser<'i, '_>) -> Result<(), ParseError<'i, ()>> {
    while input.next().is_ok() {}
    Ok(())
}

/// Top-level and nested rule lists
struct RuleListParser;

impl<'i> QualifiedRuleParser<'i> for RuleListParser {
    type Prelude = SelectorList<Simple>;
    type QualifiedRule = Vec<StyleRule>;
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        let start = input.position();
        SelectorList::parse(&html_selector::Parser, input, ParseRelative::No).map_err(|e| {
            let selector = input.slice_from(start);
            tracing::debug!(selector, error = ?e.kind, "Skipping selector");
            input.new_custom_error(())
        })
    }

    fn parse_block<'t>(
        &mut self,
        prelude: Self::Prelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::QualifiedRule, ParseError<'i, Self::Error>> {
        let declarations = read_declarations(input);
        if declarations.is_empty() {
            return Ok(Vec::new());
        }
        Ok(prelude
            .0
            .into_iter()
            .map(|selector| StyleRule {
                specificity: Specificity::of(&selector),
                selector,
                declarations: declarations.clone(),
            })
            .collect())
    }
}

impl<'i> AtRuleParser<'i> for RuleListParser {
    type Prelude = ();
    type AtRule = Vec<StyleRule>;
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        if !NESTING_AT_RULES.iter().any(|n| name.eq_ignore_ascii_case(n)) {
            return Err(input.new_custom_error(()));
        }
        skip_tokens(input)
    }

    fn parse_block<'t>(
        &mut self,
        _prelude: Self::Prelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::AtRule, ParseError<'i, Self::Error>> {
        Ok(cssparser::StyleSheetParser::new(input, self)
            .flatten()
            .flatten()
            .collect())
    }
}

/// Declarations of one block; nested rules are skipped
struct DeclarationListParser;

impl<'i> DeclarationParser<'i> for DeclarationListParser {
    type Declaration = Declaration;
    type Error = ();

    fn parse_value<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Declaration, ParseError<'i, Self::Error>> {
        let start = input.position();
        let mut end = start;
        let mut important = false;

        while !input.is_exhausted() {
            if input.try_parse(cssparser::parse_important).is_ok() {
                input.expect_exhausted()?;
                important = true;
                break;
            }
            let opens_block = matches!(
                input.next()?,
                Token::Function(_)
                    | Token::ParenthesisBlock
                    | Token::SquareBracketBlock
                    | Token::CurlyBracketBlock
            );
            if opens_block {
                input.parse_nested_block(skip_tokens)?;
            }
            end = input.position();
        }

        let value = input.slice(start..end).trim();
        if value.is_empty() {
            return Err(input.new_custom_error(()));
        }
        Ok(Declaration {
            property: name.to_ascii_lowercase(),
            value: value.to_string(),
            important,
        })
    }
}

impl<'i> QualifiedRuleParser<'i> for DeclarationListParser {
    type Prelude = ();
    type QualifiedRule = Declaration;
    type Error = ();
}

impl<'i> AtRuleParser<'i> for DeclarationListParser {
    type Prelude = ();
    type AtRule = Declaration;
    type Error = ();
}

impl<'i> RuleBodyItemParser<'i, Declaration, ()> for DeclarationListParser {
    fn parse_declarations(&self) -> bool {
        true
    }
    fn parse_qualified(&self) -> bool {
        false
    }
}
