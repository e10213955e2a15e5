mod test_scrape;
