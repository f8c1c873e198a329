use tantivy::tokenizer::{LowerCaser, RemoveLongFilter, SimpleTokenizer, StopWordFilter, TextAnalyzer, TokenStream};

/// English stop-words dropped from the vocabulary.
pub const STOP_WORDS: &[&str] = &[
	"a","about","above","after","again","against","all","also","am","an","and","any","are","as","at","be","because","been",
	"before","being","below","between","both","but","by","can","cannot","could","did","do","does","doing","down","during",
	"each","else","etc","ever","every","few","for","from","further","get","had","has","have","having","he","her","here",
	"hers","herself","him","himself","his","how","however","i","ie","if","in","into","is","it","its","itself","just","may",
	"me","might","more","most","must","my","myself","no","nor","not","now","of","off","on","once","only","or","other",
	"our","ours","ourselves","out","over","own","same","shall","she","should","so","some","such","than","that","the",
	"their","theirs","them","themselves","then","there","these","they","this","those","through","to","too","under",
	"until","up","upon","us","very","was","we","were","what","when","where","whether","which","while","who","whom",
	"whose","why","will","with","within","without","would","yet","you","your","yours","yourself","yourselves",
];

/// Tokens shorter than this (in chars) are not indexed.
pub const MIN_TOKEN_CHARS: usize = 2;

pub fn build_analyzer() -> TextAnalyzer {
	TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(RemoveLongFilter::limit(64))
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(STOP_WORDS.iter().map(|s| (*s).to_string())))
		.build()
}

/// Run `text` through the analyzer and collect the surviving terms in order.
pub fn tokenize(analyzer: &mut TextAnalyzer, text: &str) -> Vec<String> {
	let mut terms = Vec::new();
	let mut stream = analyzer.token_stream(text);
	while stream.advance() {
		let term = &stream.token().text;
		if term.chars().count() >= MIN_TOKEN_CHARS {
			terms.push(term.clone());
		}
	}
	terms
}
