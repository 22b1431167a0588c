//! In-memory EPUB containers for tests

use std::io::{Cursor, Write};

use indexmap::IndexMap;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::archive::EpubArchive;

pub const CONTAINER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

pub const PACKAGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
    <dc:title>Sample Book</dc:title>
    <dc:language>en</dc:language>
    <dc:creator opf:role="aut">Jane Doe</dc:creator>
    <dc:date>2020-01-01</dc:date>
    <dc:identifier id="uid">book-1234</dc:identifier>
    <dc:description>A small   sample.</dc:description>
  </metadata>
  <manifest>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="c1" href="chapter1.xhtml" media-type="application/xhtml+xml"/>
    <item id="c2" href="text/chapter2.xhtml" media-type="application/xhtml+xml"/>
    <item id="css" href="style.css" media-type="text/css"/>
    <item id="cover" href="images/cover.jpg" media-type="image/jpeg"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="c1"/>
    <itemref idref="c2"/>
  </spine>
</package>"#;

pub const NCX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head><meta name="dtb:uid" content="book-1234"/></head>
  <docTitle><text>Sample Book</text></docTitle>
  <docAuthor><text>Jane Doe</text></docAuthor>
  <navMap>
    <navPoint id="np1" playOrder="1">
      <navLabel><text>Chapter One</text></navLabel>
      <content src="chapter1.xhtml#start"/>
    </navPoint>
  </navMap>
</ncx>"#;

pub const CHAPTER_ONE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>One</title><link rel="stylesheet" href="style.css"/></head>
<body>
  stray text
  <h1 id="start">Chapter One</h1>
  <p>First&nbsp;paragraph &amp; more.</p>
  <div><p>Go to <a href="text/chapter2.xhtml#sec2">the next one</a>.</p></div>
  <p><img src="../images/cover.jpg" alt="cover"/><br></p>
  <script>track()</script>
</body>
</html>"#;

pub const CHAPTER_TWO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>Two</title></head>
<body>
  <h2 id="sec2">Chapter Two</h2>
  <p>The end.</p>
</body>
</html>"#;

pub const GENRES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata xmlns="http://www.idpf.org/2007/opf" xmlns:atom="http://www.w3.org/2005/Atom">
  <atom:category term="fantasy" label="Fantasy"/>
  <atom:category term="adventure" label="Adventure"/>
</metadata>"#;

pub const COVER_BYTES: &[u8] = b"\xFF\xD8\xFF\xE0fake-jpeg";

/// Builder for a ZIP container whose entries are written in insertion order
#[derive(Default)]
pub struct EpubFixture {
    files: IndexMap<String, Vec<u8>>,
}

impl EpubFixture {
    pub fn new() -> Self {
        Self::default().file("mimetype", "application/epub+zip")
    }

    /// A complete two-chapter publication stored under `OEBPS/`
    pub fn sample() -> Self {
        Self::new()
            .file("META-INF/container.xml", CONTAINER)
            .file("META-INF/metadata.xml", GENRES)
            .file("OEBPS/content.opf", PACKAGE)
            .file("OEBPS/toc.ncx", NCX)
            .file("OEBPS/chapter1.xhtml", CHAPTER_ONE)
            .file("OEBPS/text/chapter2.xhtml", CHAPTER_TWO)
            .file("OEBPS/style.css", "p { margin: 0; }")
            .file("OEBPS/images/cover.jpg", COVER_BYTES)
    }

    /// Adds an entry, replacing any entry with the same name
    pub fn file(mut self, name: &str, content: impl AsRef<[u8]>) -> Self {
        self.files
            .insert(name.to_string(), content.as_ref().to_vec());
        self
    }

    pub fn without(mut self, name: &str) -> Self {
        self.files.shift_remove(name);
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        for (name, content) in &self.files {
            zip.start_file(name.as_str(), options).unwrap();
            zip.write_all(content).unwrap();
        }

        zip.finish().unwrap().into_inner()
    }

    pub fn into_reader(self) -> Cursor<Vec<u8>> {
        Cursor::new(self.into_bytes())
    }

    pub fn into_archive(self) -> EpubArchive<Cursor<Vec<u8>>> {
        EpubArchive::from_reader(self.into_reader()).unwrap()
    }
}
