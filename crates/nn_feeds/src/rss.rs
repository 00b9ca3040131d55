use std::collections::HashSet;
use std::io::BufRead;

use nn_core::types::pub_date;
use nn_core::{Article, Category, Error, Media, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::images::{first_img_src, is_valid_image_url, strip_html};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Title,
    Description,
    Link,
    PubDate,
    Category,
}

impl Field {
    fn from_tag(name: &[u8]) -> Option<Field> {
        match name {
            b"title" => Some(Field::Title),
            b"description" => Some(Field::Description),
            b"link" => Some(Field::Link),
            b"pubDate" => Some(Field::PubDate),
            b"category" => Some(Field::Category),
            _ => None,
        }
    }
}

/// Raw values collected between `<item>` and `</item>`.
#[derive(Debug, Default)]
struct ItemFields {
    title: String,
    description: String,
    link: String,
    pub_date: String,
    categories: Vec<String>,
    media_content: Vec<String>,
    enclosures: Vec<String>,
}

impl ItemFields {
    fn push_text(&mut self, field: Field, text: &str) {
        match field {
            Field::Title => self.title.push_str(text),
            Field::Description => self.description.push_str(text),
            Field::Link => self.link.push_str(text),
            Field::PubDate => self.pub_date.push_str(text),
            Field::Category => {
                if let Some(last) = self.categories.last_mut() {
                    last.push_str(text);
                }
            }
        }
    }

    /// `media:content` first, then image enclosures, then the first `<img>`
    /// in the description.
    fn image_url(&self) -> Option<String> {
        let from_description = first_img_src(&self.description);
        self.media_content
            .iter()
            .chain(self.enclosures.iter())
            .chain(from_description.iter())
            .find(|url| is_valid_image_url(url))
            .cloned()
    }

    fn into_article(self, medium: Media) -> Article {
        let image_url = self.image_url();
        let category = Category::resolve(self.categories.iter().map(|c| c.trim()));
        let mut article = Article::new(
            self.title.trim(),
            strip_html(&self.description),
            category,
            self.link.trim(),
            medium,
        );
        article.image_url = image_url;
        article.pub_date = pub_date::parse(&self.pub_date);
        article
    }
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

/// Records image candidates carried as attributes.
fn collect_media(e: &BytesStart<'_>, item: &mut ItemFields) {
    match e.name().as_ref() {
        b"media:content" => {
            if let Some(url) = attribute(e, b"url") {
                item.media_content.push(url);
            }
        }
        b"enclosure" => {
            let is_image = attribute(e, b"type").map_or(false, |t| t.starts_with("image/"));
            if let (true, Some(url)) = (is_image, attribute(e, b"url")) {
                item.enclosures.push(url);
            }
        }
        _ => {}
    }
}

/// Pull parser over an RSS 2.0 document, yielding one `Article` per `<item>`.
pub struct FeedReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    medium: Media,
    done: bool,
}

impl<R: BufRead> FeedReader<R> {
    pub fn new(source: R, medium: Media) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.config_mut().trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
            medium,
            done: false,
        }
    }

    fn next_item(&mut self) -> Result<Option<Article>> {
        let mut item: Option<ItemFields> = None;
        let mut field: Option<Field> = None;

        loop {
            self.buf.clear();
            let event = self
                .reader
                .read_event_into(&mut self.buf)
                .map_err(|e| Error::Feed(format!("{}: {}", self.medium, e)))?;

            match event {
                Event::Start(e) => {
                    if e.name().as_ref() == b"item" {
                        item = Some(ItemFields::default());
                        field = None;
                    } else if let Some(current) = item.as_mut() {
                        collect_media(&e, current);
                        field = Field::from_tag(e.name().as_ref());
                        if field == Some(Field::Category) {
                            current.categories.push(String::new());
                        }
                    }
                }
                Event::Empty(e) => {
                    if let Some(current) = item.as_mut() {
                        collect_media(&e, current);
                    }
                }
                Event::Text(t) => {
                    if let (Some(current), Some(f)) = (item.as_mut(), field) {
                        let text = t
                            .unescape()
                            .map_err(|e| Error::Feed(format!("{}: {}", self.medium, e)))?;
                        current.push_text(f, &text);
                    }
                }
                Event::CData(c) => {
                    if let (Some(current), Some(f)) = (item.as_mut(), field) {
                        current.push_text(f, &String::from_utf8_lossy(&c));
                    }
                }
                Event::End(e) => {
                    if e.name().as_ref() == b"item" {
                        if let Some(done) = item.take() {
                            return Ok(Some(done.into_article(self.medium)));
                        }
                    }
                    field = None;
                }
                Event::Eof => return Ok(None),
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for FeedReader<R> {
    type Item = Result<Article>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_item() {
            Ok(Some(article)) => Some(Ok(article)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Parses a whole feed document. Items repeating an earlier link are dropped.
pub fn parse_feed(xml: &[u8], medium: Media) -> Result<Vec<Article>> {
    let mut seen = HashSet::new();
    let mut articles = Vec::new();
    for article in FeedReader::new(xml, medium) {
        let article = article?;
        if !article.link.is_empty() && !seen.insert(article.link.clone()) {
            debug!("Duplicate link in {} feed: {}", medium, article.link);
            continue;
        }
        articles.push(article);
    }
    Ok(articles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Portada</title>
    <link>https://www.ejemplo.es</link>
    <item>
      <title>El Gobierno aprueba los presupuestos</title>
      <link>https://www.ejemplo.es/politica/1</link>
      <description><![CDATA[<p>El Consejo de Ministros <b>aprueba</b> las cuentas.</p>]]></description>
      <pubDate>Mon, 05 May 2025 08:30:00 +0200</pubDate>
      <category>España</category>
      <category>Política</category>
      <media:content url="https://cdn.ejemplo.es/foto1.jpg" medium="image"/>
    </item>
    <item>
      <title>Resultados &amp; clasificación</title>
      <link>https://www.ejemplo.es/deportes/2</link>
      <description>Crónica de la jornada</description>
      <enclosure url="https://cdn.ejemplo.es/clip.mp4" type="video/mp4"/>
      <enclosure url="https://cdn.ejemplo.es/foto2.png" type="image/png"/>
    </item>
    <item>
      <title>Nueva exposición</title>
      <link>https://www.ejemplo.es/cultura/3</link>
      <description>&lt;img src="https://cdn.ejemplo.es/expo.webp"&gt; Abre el museo</description>
      <category>Cultura</category>
    </item>
    <item>
      <title>Repetida</title>
      <link>https://www.ejemplo.es/politica/1</link>
      <description>Duplicado</description>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_feed_fields() {
        let articles = parse_feed(FEED.as_bytes(), Media::ElPais).unwrap();
        assert_eq!(articles.len(), 3);

        let first = &articles[0];
        assert_eq!(first.title, "El Gobierno aprueba los presupuestos");
        assert_eq!(first.description, "El Consejo de Ministros aprueba las cuentas.");
        assert_eq!(first.category, Category::Politica);
        assert_eq!(first.image_url.as_deref(), Some("https://cdn.ejemplo.es/foto1.jpg"));
        assert_eq!(first.source_medium, Media::ElPais);
        assert_eq!(
            first.pub_date,
            Some(Utc.with_ymd_and_hms(2025, 5, 5, 6, 30, 0).unwrap())
        );
        assert!(first.group.is_none());
    }

    #[test]
    fn test_image_fallbacks() {
        let articles = parse_feed(FEED.as_bytes(), Media::Abc).unwrap();
        assert_eq!(articles[1].title, "Resultados & clasificación");
        assert_eq!(articles[1].image_url.as_deref(), Some("https://cdn.ejemplo.es/foto2.png"));
        assert_eq!(articles[1].category, Category::SinCategoria);
        assert_eq!(articles[1].pub_date, None);

        assert_eq!(articles[2].image_url.as_deref(), Some("https://cdn.ejemplo.es/expo.webp"));
        assert_eq!(articles[2].description, "Abre el museo");
        assert_eq!(articles[2].category, Category::Cultura);
    }

    #[test]
    fn test_reader_is_lazy() {
        let mut reader = FeedReader::new(FEED.as_bytes(), Media::Cope);
        let first = reader.next().unwrap().unwrap();
        assert_eq!(first.link, "https://www.ejemplo.es/politica/1");
        assert_eq!(reader.count(), 3);
    }

    #[test]
    fn test_channel_without_items() {
        let xml = "<rss><channel><title>Vacío</title></channel></rss>";
        assert!(parse_feed(xml.as_bytes(), Media::Rtve).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_feed_is_an_error() {
        let xml = "<rss><channel><item><title>Roto</title></channel></rss>";
        let result = parse_feed(xml.as_bytes(), Media::Rtve);
        assert!(matches!(result, Err(Error::Feed(_))));
    }
}
