/// Questions per listing page.
pub const PER_PAGE: i64 = 5;

/// Paginator
///
/// Splits `count` items into pages of `per_page`. An empty collection still has
/// one (empty) page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    count: i64,
    per_page: i64,
}

/// PageWindow
///
/// The resolved page: which number it is and which slice of the ordered
/// collection it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: i64,
    pub num_pages: i64,
    pub count: i64,
    pub offset: i64,
    pub limit: i64,
}

impl PageWindow {
    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }
}

impl Paginator {
    pub fn new(count: i64, per_page: i64) -> Self {
        Self {
            count: count.max(0),
            per_page: per_page.max(1),
        }
    }

    pub fn num_pages(&self) -> i64 {
        if self.count == 0 {
            1
        } else {
            (self.count + self.per_page - 1) / self.per_page
        }
    }

    /// page
    ///
    /// Resolves the raw `page` query value:
    /// - missing or not an integer: page 1
    /// - below 1 or past the end: the last page
    pub fn page(&self, raw: Option<&str>) -> PageWindow {
        let num_pages = self.num_pages();
        let number = match raw.and_then(|value| value.trim().parse::<i64>().ok()) {
            None => 1,
            Some(n) if n < 1 || n > num_pages => num_pages,
            Some(n) => n,
        };

        let offset = (number - 1) * self.per_page;
        let limit = self.per_page.min(self.count - offset).max(0);

        PageWindow {
            number,
            num_pages,
            count: self.count,
            offset,
            limit,
        }
    }
}
